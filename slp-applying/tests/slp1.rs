mod common;

use common::Bed;

use slp_applying::{Rejection, Slp1Error, Verdict};
use slp_codec::{Payload, Slp1Op};
use slp_math::Decimal;

fn genesis(de: u8, qt: u64, pa: bool, mi: bool) -> Payload {
    Payload::Slp1(Slp1Op::Genesis {
        id: String::new(),
        de,
        qt: Decimal::from(qt),
        sy: "ABC".to_string(),
        na: "Token".to_string(),
        du: String::new(),
        no: String::new(),
        pa,
        mi,
    })
}

fn send(id: &str, qt: &str) -> Payload {
    Payload::Slp1(Slp1Op::Send {
        id: id.to_string(),
        qt: qt.parse().unwrap(),
        no: String::new(),
    })
}

fn mint(id: &str, qt: u64) -> Payload {
    Payload::Slp1(Slp1Op::Mint {
        id: id.to_string(),
        qt: Decimal::from(qt),
        no: String::new(),
    })
}

fn burn(id: &str, qt: &str) -> Payload {
    Payload::Slp1(Slp1Op::Burn {
        id: id.to_string(),
        qt: qt.parse().unwrap(),
        no: String::new(),
    })
}

fn freeze(id: &str) -> Payload {
    Payload::Slp1(Slp1Op::Freeze {
        id: id.to_string(),
        no: String::new(),
    })
}

/// Runs a genesis and returns the new token id.
fn genesis_token(bed: &Bed, height: u64, de: u8, qt: u64, pa: bool, mi: bool) -> String {
    let (stamp, verdict) = bed.feed(height, 1, "A", "M", 100, genesis(de, qt, pa, mi));
    assert_eq!(verdict, Verdict::Applied);
    let record = bed.store.find_record(stamp).unwrap().unwrap();
    record.token_id().to_string()
}

#[test]
fn genesis_materializes_contract_and_owner_wallet() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);

    let contract = bed.store.find_contract(&id).unwrap().unwrap();
    assert_eq!(contract.symbol, "ABC");
    assert_eq!(contract.owner, "A");
    assert!(!contract.paused);
    let supply = contract.supply.unwrap();
    assert_eq!(supply.global.to_string(), "1000.00");
    assert_eq!(supply.minted.to_string(), "1000.00");
    assert_eq!(supply.burned.to_string(), "0.00");
    assert_eq!(supply.crossed.to_string(), "0.00");

    let wallet = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    assert_eq!(wallet.balance.to_string(), "1000.00");
    assert!(wallet.owner);
    assert!(!wallet.frozen);
}

#[test]
fn genesis_below_cost_is_rejected() {
    let bed = Bed::new();
    let (stamp, verdict) = bed.feed(10, 1, "A", "M", 10, genesis(2, 1000, false, false));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::CostBelowFee("GENESIS")))
    );
    let rejected = bed.store.find_rejected(stamp).unwrap().unwrap();
    assert!(rejected.comment.contains("GENESIS cost"));
}

#[test]
fn send_moves_funds_and_stamps_both_wallets() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);

    let (_, verdict) = bed.feed(11, 1, "A", "B", 1, send(&id, "250"));
    assert_eq!(verdict, Verdict::Applied);

    let a = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    let b = bed.store.find_slp1_wallet(&id, "B").unwrap().unwrap();
    assert_eq!(a.balance.to_string(), "750.00");
    assert_eq!(b.balance.to_string(), "250.00");
    assert!(!b.owner);
    assert!(!b.frozen);
    assert_eq!(a.block_stamp.to_string(), "11#1");
    assert_eq!(b.block_stamp.to_string(), "11#1");
}

#[test]
fn send_from_frozen_wallet_is_rejected() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);

    // the owner freezes their own wallet, then tries to spend from it
    let (_, verdict) = bed.feed(11, 1, "A", "A", 1, freeze(&id));
    assert_eq!(verdict, Verdict::Applied);

    let (stamp, verdict) = bed.feed(12, 1, "A", "B", 1, send(&id, "100"));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::Frozen("A".to_string())))
    );

    let rejected = bed.store.find_rejected(stamp).unwrap().unwrap();
    assert!(rejected.comment.contains("frozen"));
    let record = bed.store.find_record(stamp).unwrap().unwrap();
    assert_eq!(record.legit, Some(false));

    let a = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    assert_eq!(a.balance.to_string(), "1000.00");
    assert!(bed.store.find_slp1_wallet(&id, "B").unwrap().is_none());
}

#[test]
fn send_of_entire_balance_is_refused() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 0, 100, false, false);

    let (_, verdict) = bed.feed(11, 1, "A", "B", 1, send(&id, "100"));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::InsufficientBalance(
            "A".to_string()
        )))
    );
}

#[test]
fn mint_respects_the_declared_supply() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 0, 100, false, true);

    // mintable genesis starts with nothing minted
    let contract = bed.store.find_contract(&id).unwrap().unwrap();
    assert_eq!(contract.supply.unwrap().minted.to_string(), "0");

    let (_, verdict) = bed.feed(11, 1, "A", "M", 1, mint(&id, 80));
    assert_eq!(verdict, Verdict::Applied);

    let (_, verdict) = bed.feed(12, 1, "A", "M", 1, mint(&id, 30));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::SupplyOverflow))
    );

    let (_, verdict) = bed.feed(13, 1, "A", "M", 1, mint(&id, 20));
    assert_eq!(verdict, Verdict::Applied);

    let supply = bed.store.find_contract(&id).unwrap().unwrap().supply.unwrap();
    assert_eq!(supply.minted.to_string(), "100");
    let wallet = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    assert_eq!(wallet.balance.to_string(), "100");
}

#[test]
fn mint_on_non_mintable_token_is_rejected() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 0, 100, false, false);
    let (_, verdict) = bed.feed(11, 1, "A", "M", 1, mint(&id, 10));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::NotMintable(id)))
    );
}

#[test]
fn burn_requires_integral_quantity() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);
    let (_, verdict) = bed.feed(11, 1, "A", "M", 1, burn(&id, "10.5"));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::QuantityNotIntegral("burn")))
    );
}

#[test]
fn burn_debits_owner_and_counts_supply() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);
    let (_, verdict) = bed.feed(11, 1, "A", "M", 1, burn(&id, "100"));
    assert_eq!(verdict, Verdict::Applied);

    let wallet = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    assert_eq!(wallet.balance.to_string(), "900.00");
    let supply = bed.store.find_contract(&id).unwrap().unwrap().supply.unwrap();
    assert_eq!(supply.burned.to_string(), "100.00");
}

#[test]
fn conservation_holds_across_operations() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);
    bed.feed(11, 1, "A", "B", 1, send(&id, "250"));
    bed.feed(12, 1, "A", "M", 1, burn(&id, "100"));
    bed.feed(13, 1, "B", "C", 1, send(&id, "50"));

    let supply = bed.store.find_contract(&id).unwrap().unwrap().supply.unwrap();
    let mut held = Decimal::zero(2);
    for address in ["A", "B", "C"] {
        if let Some(wallet) = bed.store.find_slp1_wallet(&id, address).unwrap() {
            held = held.checked_add(&wallet.balance).unwrap();
        }
    }
    let accounted = held
        .checked_add(&supply.burned)
        .unwrap()
        .checked_add(&supply.crossed)
        .unwrap();
    assert_eq!(accounted, supply.minted);
}

#[test]
fn replaying_a_settled_record_is_a_noop() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);
    let (stamp, verdict) = bed.feed(11, 1, "A", "B", 1, send(&id, "250"));
    assert_eq!(verdict, Verdict::Applied);

    assert_eq!(bed.replay(stamp), Verdict::Skipped);
    let a = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    assert_eq!(a.balance.to_string(), "750.00");
}

#[test]
fn pause_gates_on_the_genesis_flag() {
    let bed = Bed::new();
    let fixed = genesis_token(&bed, 10, 0, 100, false, false);
    let (_, verdict) = bed.feed(
        11,
        1,
        "A",
        "M",
        1,
        Payload::Slp1(Slp1Op::Pause {
            id: fixed.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp1(Slp1Error::NotPausable(fixed)))
    );
}

#[test]
fn new_owner_carries_the_whole_balance() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, 2, 1000, false, false);
    let (_, verdict) = bed.feed(
        11,
        1,
        "A",
        "B",
        1,
        Payload::Slp1(Slp1Op::NewOwner {
            id: id.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);

    let a = bed.store.find_slp1_wallet(&id, "A").unwrap().unwrap();
    let b = bed.store.find_slp1_wallet(&id, "B").unwrap().unwrap();
    assert!(a.balance.is_zero());
    assert!(!a.owner);
    assert_eq!(b.balance.to_string(), "1000.00");
    assert!(b.owner);

    let contract = bed.store.find_contract(&id).unwrap().unwrap();
    assert_eq!(contract.owner, "B");
}
