use slp_codec::{Payload, Slp1Op};
use slp_crypto::{chain_poh, Digest};
use slp_math::Decimal;

use crate::kvtable::Error;
use crate::model::{BlockStamp, Record, Slp1Wallet, Slp2Wallet};

use super::Store;

fn with_tmp_db<T>(op: fn(store: Store) -> T) {
    let path = tempfile::tempdir().unwrap().into_path();
    let store = Store::open(path.clone(), Digest::Sha256).unwrap();

    op(store);

    Store::destroy(path).unwrap();
}

fn token() -> String {
    "ab".repeat(16)
}

fn record(height: u64, index: u16, op: Payload) -> Record {
    Record {
        stamp: BlockStamp::new(height, index),
        txid: format!("{:064x}", height * 1000 + u64::from(index)),
        emitter: "A".to_string(),
        receiver: "M".to_string(),
        cost: 1,
        timestamp: 0.0,
        legit: None,
        poh: None,
        op,
    }
}

fn send(qt: u64) -> Payload {
    Payload::Slp1(Slp1Op::Send {
        id: token(),
        qt: Decimal::from(qt),
        no: String::new(),
    })
}

fn genesis() -> Payload {
    Payload::Slp1(Slp1Op::Genesis {
        id: token(),
        de: 2,
        qt: Decimal::from(1000u64),
        sy: "ABC".to_string(),
        na: "Token".to_string(),
        du: String::new(),
        no: String::new(),
        pa: false,
        mi: false,
    })
}

fn wallet(address: &str, token_id: &str, balance: u64) -> Slp1Wallet {
    Slp1Wallet {
        address: address.to_string(),
        token_id: token_id.to_string(),
        block_stamp: BlockStamp::new(10, 1),
        balance: Decimal::from(balance),
        owner: false,
        frozen: false,
    }
}

#[test]
fn journal_lookups_cover_secondary_indices() {
    with_tmp_db(|store| {
        let genesis_record = record(10, 1, genesis());
        store.append_record(&genesis_record).unwrap();

        let found = store.find_record(BlockStamp::new(10, 1)).unwrap().unwrap();
        assert_eq!(found, genesis_record);

        let by_txid = store.record_by_txid(&genesis_record.txid).unwrap().unwrap();
        assert_eq!(by_txid.stamp, genesis_record.stamp);

        let by_token = store.genesis_record(&token()).unwrap().unwrap();
        assert_eq!(by_token.stamp, genesis_record.stamp);

        assert_eq!(store.tip().unwrap(), Some(BlockStamp::new(10, 1)));
    });
}

#[test]
fn journal_refuses_out_of_order_appends() {
    with_tmp_db(|store| {
        store.append_record(&record(10, 2, send(5))).unwrap();
        assert!(matches!(
            store.append_record(&record(10, 2, send(5))),
            Err(Error::OutOfOrder)
        ));
        assert!(matches!(
            store.append_record(&record(10, 1, send(5))),
            Err(Error::OutOfOrder)
        ));
        store.append_record(&record(11, 1, send(5))).unwrap();
    });
}

#[test]
fn legit_flag_settles_exactly_once() {
    with_tmp_db(|store| {
        store.append_record(&record(10, 1, send(5))).unwrap();
        let judged = store.set_legit(BlockStamp::new(10, 1), true).unwrap();
        assert_eq!(judged.legit, Some(true));
        assert!(judged.poh.is_some());
        assert!(matches!(
            store.set_legit(BlockStamp::new(10, 1), false),
            Err(Error::AlreadyJudged)
        ));
    });
}

#[test]
fn poh_chains_over_legit_records_only() {
    with_tmp_db(|store| {
        let r1 = record(10, 1, send(5));
        let r2 = record(10, 2, send(6));
        let r3 = record(10, 3, send(7));
        for r in [&r1, &r2, &r3] {
            store.append_record(r).unwrap();
        }

        let first = store.set_legit(r1.stamp, true).unwrap();
        let rejected = store.set_legit(r2.stamp, false).unwrap();
        let third = store.set_legit(r3.stamp, true).unwrap();

        assert!(rejected.poh.is_none());

        let digest = store.digest();
        let expected_first = chain_poh(digest, "", &r1.seed(digest));
        assert_eq!(first.poh.as_deref(), Some(expected_first.as_str()));

        // the rejected record is invisible to the chain
        let expected_third = chain_poh(digest, &expected_first, &r3.seed(digest));
        assert_eq!(third.poh.as_deref(), Some(expected_third.as_str()));

        assert_eq!(
            store
                .previous_legit_poh(r3.family(), r3.stamp)
                .unwrap()
                .as_deref(),
            Some(expected_first.as_str())
        );
        assert_eq!(
            store.last_poh(r3.family()).unwrap().as_deref(),
            Some(expected_third.as_str())
        );
    });
}

#[test]
fn rejected_records_are_copied_with_their_cause() {
    with_tmp_db(|store| {
        let r = record(10, 1, send(5));
        store.append_record(&r).unwrap();
        store.reject(&r, "wallet A frozen by owner").unwrap();
        let copy = store.find_rejected(r.stamp).unwrap().unwrap();
        assert_eq!(copy.comment, "wallet A frozen by owner");
        assert_eq!(copy.record.stamp, r.stamp);
    });
}

#[test]
fn exchange_credits_then_debits() {
    with_tmp_db(|store| {
        let id = token();
        store.upsert_slp1_wallet(&wallet("A", &id, 1000)).unwrap();

        let done = store
            .exchange_slp1_token(&id, "A", "B", &Decimal::from(250u64))
            .unwrap();
        assert!(done);

        let a = store.find_slp1_wallet(&id, "A").unwrap().unwrap();
        let b = store.find_slp1_wallet(&id, "B").unwrap().unwrap();
        assert_eq!(a.balance, Decimal::from(750u64));
        assert_eq!(b.balance, Decimal::from(250u64));
        assert!(!b.owner);
    });
}

#[test]
fn exchange_reverses_credit_on_shortfall() {
    with_tmp_db(|store| {
        let id = token();
        store.upsert_slp1_wallet(&wallet("A", &id, 100)).unwrap();

        let done = store
            .exchange_slp1_token(&id, "A", "B", &Decimal::from(250u64))
            .unwrap();
        assert!(!done);

        // sender untouched, receiver never materialized
        let a = store.find_slp1_wallet(&id, "A").unwrap().unwrap();
        assert_eq!(a.balance, Decimal::from(100u64));
        assert!(store.find_slp1_wallet(&id, "B").unwrap().is_none());
    });
}

#[test]
fn exchange_requires_a_sender_wallet() {
    with_tmp_db(|store| {
        let done = store
            .exchange_slp1_token(&token(), "A", "B", &Decimal::from(1u64))
            .unwrap();
        assert!(!done);
    });
}

#[test]
fn slp2_wallets_group_by_token() {
    with_tmp_db(|store| {
        let first = "aa".repeat(16);
        let second = "bb".repeat(16);
        for (token_id, address) in [(&first, "A"), (&first, "B"), (&second, "C")] {
            store
                .insert_slp2_wallet(&Slp2Wallet {
                    address: address.to_string(),
                    token_id: token_id.clone(),
                    block_stamp: BlockStamp::new(10, 1),
                    owner: address == "A",
                    metadata: address.as_bytes().to_vec(),
                })
                .unwrap();
        }

        let wallets = store.slp2_wallets(&first).unwrap();
        assert_eq!(wallets.len(), 2);
        assert!(wallets.iter().all(|w| w.token_id == first));
    });
}
