mod common;

use common::Bed;

use slp_applying::{Rejection, Slp2Error, Verdict};
use slp_codec::varia::unpack_meta;
use slp_codec::{Payload, Slp2Op};

fn genesis(pa: bool) -> Payload {
    Payload::Slp2(Slp2Op::Genesis {
        id: String::new(),
        sy: "META".to_string(),
        na: "Metadata".to_string(),
        du: String::new(),
        no: String::new(),
        pa,
    })
}

fn add_meta_pair(id: &str, key: &str, value: &str) -> Payload {
    Payload::Slp2(Slp2Op::AddMeta {
        id: id.to_string(),
        ch: 1,
        na: Some(key.to_string()),
        dt: value.to_string(),
    })
}

fn auth_meta(id: &str) -> Payload {
    Payload::Slp2(Slp2Op::AuthMeta {
        id: id.to_string(),
        no: String::new(),
    })
}

fn genesis_token(bed: &Bed, height: u64, pa: bool) -> String {
    let (stamp, verdict) = bed.feed(height, 1, "A", "M", 100, genesis(pa));
    assert_eq!(verdict, Verdict::Applied);
    let record = bed.store.find_record(stamp).unwrap().unwrap();
    record.token_id().to_string()
}

#[test]
fn genesis_creates_contract_and_owner_wallet() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);

    let contract = bed.store.find_contract(&id).unwrap().unwrap();
    assert_eq!(contract.symbol, "META");
    assert!(contract.supply.is_none());

    let wallet = bed.store.find_slp2_wallet(&id, "A").unwrap().unwrap();
    assert!(wallet.owner);
    assert!(wallet.metadata.is_empty());
}

#[test]
fn editors_append_and_clone_aggregates() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);

    let (_, verdict) = bed.feed(11, 1, "A", "M", 1, add_meta_pair(&id, "author", "x"));
    assert_eq!(verdict, Verdict::Applied);

    let (_, verdict) = bed.feed(12, 1, "A", "B", 1, auth_meta(&id));
    assert_eq!(verdict, Verdict::Applied);

    let (_, verdict) = bed.feed(13, 1, "B", "M", 1, add_meta_pair(&id, "license", "MIT"));
    assert_eq!(verdict, Verdict::Applied);

    let (stamp, verdict) = bed.feed(
        14,
        1,
        "A",
        "M",
        1,
        Payload::Slp2(Slp2Op::Clone {
            id: id.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);

    // the clone is a fresh token owned by A whose single wallet carries
    // every editor's metadata
    let record = bed.store.find_record(stamp).unwrap().unwrap();
    let clone_id = slp_crypto::token_id("_slp2", "META", 14, &record.txid);
    assert_ne!(clone_id, id);

    let contract = bed.store.find_contract(&clone_id).unwrap().unwrap();
    assert_eq!(contract.owner, "A");
    assert_eq!(contract.symbol, "META");

    let wallets = bed.store.slp2_wallets(&clone_id).unwrap();
    assert_eq!(wallets.len(), 1);
    let bag = unpack_meta(&wallets[0].metadata).unwrap();
    assert_eq!(bag.len(), 2);
    assert_eq!(bag["author"], "x");
    assert_eq!(bag["license"], "MIT");
}

#[test]
fn unauthorized_editors_are_refused() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);
    let (_, verdict) = bed.feed(11, 1, "B", "M", 1, add_meta_pair(&id, "k", "v"));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp2(Slp2Error::WalletNotFound("B".to_string())))
    );
}

#[test]
fn revoke_deletes_the_wallet_for_good() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);
    bed.feed(11, 1, "A", "B", 1, auth_meta(&id));
    assert!(bed.store.find_slp2_wallet(&id, "B").unwrap().is_some());

    let (_, verdict) = bed.feed(
        12,
        1,
        "A",
        "B",
        1,
        Payload::Slp2(Slp2Op::RevokeMeta {
            id: id.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);
    assert!(bed.store.find_slp2_wallet(&id, "B").unwrap().is_none());

    // a revoked editor cannot append anymore
    let (_, verdict) = bed.feed(13, 1, "B", "M", 1, add_meta_pair(&id, "k", "v"));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp2(Slp2Error::WalletNotFound("B".to_string())))
    );
}

#[test]
fn double_authorization_is_refused() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);
    bed.feed(11, 1, "A", "B", 1, auth_meta(&id));
    let (_, verdict) = bed.feed(12, 1, "A", "B", 1, auth_meta(&id));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp2(Slp2Error::AlreadyAuthorized(
            "B".to_string()
        )))
    );
}

#[test]
fn void_meta_removes_referenced_keys() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);

    let (add_stamp, _) = bed.feed(11, 1, "A", "M", 1, add_meta_pair(&id, "author", "x"));
    bed.feed(12, 1, "A", "M", 1, add_meta_pair(&id, "license", "MIT"));

    let reference = bed.store.find_record(add_stamp).unwrap().unwrap();
    let (_, verdict) = bed.feed(
        13,
        1,
        "A",
        "M",
        1,
        Payload::Slp2(Slp2Op::VoidMeta {
            id: id.clone(),
            tx: reference.txid.clone(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);

    let wallet = bed.store.find_slp2_wallet(&id, "A").unwrap().unwrap();
    let bag = unpack_meta(&wallet.metadata).unwrap();
    assert!(!bag.contains_key("author"));
    assert_eq!(bag["license"], "MIT");
}

#[test]
fn void_meta_requires_a_known_reference() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);
    let (_, verdict) = bed.feed(
        11,
        1,
        "A",
        "M",
        1,
        Payload::Slp2(Slp2Op::VoidMeta {
            id: id.clone(),
            tx: "0".repeat(64),
        }),
    );
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp2(Slp2Error::ReferenceNotFound(
            "0".repeat(64)
        )))
    );
}

#[test]
fn pause_needs_the_genesis_flag() {
    let bed = Bed::new();
    let fixed = genesis_token(&bed, 10, false);
    let (_, verdict) = bed.feed(
        11,
        1,
        "A",
        "M",
        1,
        Payload::Slp2(Slp2Op::Pause {
            id: fixed.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp2(Slp2Error::NotPausable(fixed)))
    );
}

#[test]
fn pause_and_resume_toggle_the_contract() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, true);

    let (_, verdict) = bed.feed(
        11,
        1,
        "A",
        "M",
        1,
        Payload::Slp2(Slp2Op::Pause {
            id: id.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);
    assert!(bed.store.find_contract(&id).unwrap().unwrap().paused);

    // metadata edits are refused while paused
    let (_, verdict) = bed.feed(12, 1, "A", "M", 1, add_meta_pair(&id, "k", "v"));
    assert_eq!(
        verdict,
        Verdict::Rejected(Rejection::Slp2(Slp2Error::TokenPaused(id.clone())))
    );

    let (_, verdict) = bed.feed(
        13,
        1,
        "A",
        "M",
        1,
        Payload::Slp2(Slp2Op::Resume {
            id: id.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);
    assert!(!bed.store.find_contract(&id).unwrap().unwrap().paused);
}

#[test]
fn new_owner_flips_both_wallets() {
    let bed = Bed::new();
    let id = genesis_token(&bed, 10, false);
    let (_, verdict) = bed.feed(
        11,
        1,
        "A",
        "B",
        1,
        Payload::Slp2(Slp2Op::NewOwner {
            id: id.clone(),
            no: String::new(),
        }),
    );
    assert_eq!(verdict, Verdict::Applied);

    let a = bed.store.find_slp2_wallet(&id, "A").unwrap().unwrap();
    let b = bed.store.find_slp2_wallet(&id, "B").unwrap().unwrap();
    assert!(!a.owner);
    assert!(b.owner);
    assert_eq!(bed.store.find_contract(&id).unwrap().unwrap().owner, "B");
}
