//! SLP2 (metadata token) handlers
//!
//! A metadata wallet exists iff the address owns the token or is authorised
//! to edit its metadata. The token-wide metadata is the concatenation of
//! every wallet's packed blob.

use std::collections::BTreeMap;

use serde_json::Value;

use slp_codec::varia::{pack_meta, unpack_meta};
use slp_codec::{Payload, Slp2Op};
use slp_db::{Contract, Record, Slp2Wallet};

use crate::rejection::Slp2Error;
use crate::{ensure, Checked, Context, EngineError};

pub(crate) fn apply(ctx: &Context, record: &Record, op: &Slp2Op) -> Result<Checked, EngineError> {
    match op {
        Slp2Op::Genesis { id, sy, na, du, no, .. } => genesis(ctx, record, id, sy, na, du, no),
        Slp2Op::NewOwner { id, .. } => new_owner(ctx, record, id),
        Slp2Op::Pause { id, .. } => set_paused(ctx, record, id, true),
        Slp2Op::Resume { id, .. } => set_paused(ctx, record, id, false),
        Slp2Op::AuthMeta { id, .. } => auth_meta(ctx, record, id),
        Slp2Op::RevokeMeta { id, .. } => revoke_meta(ctx, record, id),
        Slp2Op::AddMeta { id, na, dt, .. } => add_meta(ctx, record, id, na.as_deref(), dt),
        Slp2Op::VoidMeta { id, tx } => void_meta(ctx, record, id, tx),
        Slp2Op::Clone { id, .. } => clone_token(ctx, record, id),
    }
}

fn cost_ok(ctx: &Context, record: &Record, op: &'static str) -> bool {
    record.cost >= ctx.config.cost("_slp2", op, Some(record.stamp.height))
}

fn master_ok(ctx: &Context, record: &Record) -> Result<bool, EngineError> {
    Ok(record.receiver == ctx.config.master_address()?)
}

fn genesis(
    ctx: &Context,
    record: &Record,
    id: &str,
    sy: &str,
    na: &str,
    du: &str,
    no: &str,
) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "GENESIS"), Slp2Error::CostBelowFee("GENESIS"));
    ensure!(master_ok(ctx, record)?, Slp2Error::NotMasterAddress("GENESIS"));

    let contract = Contract {
        token_id: id.to_string(),
        stamp: record.stamp,
        slp_type: record.family(),
        name: na.to_string(),
        symbol: sy.to_string(),
        owner: record.emitter.clone(),
        document: du.to_string(),
        notes: no.to_string(),
        paused: false,
        de: 0,
        supply: None,
    };
    match ctx.store.insert_contract(&contract) {
        Ok(()) => {}
        Err(slp_db::kvtable::Error::Exists) => {
            return Ok(Err(Slp2Error::TokenIdCollision.into()))
        }
        Err(e) => return Err(e.into()),
    }

    ctx.store.upsert_slp2_wallet(&Slp2Wallet {
        address: record.emitter.clone(),
        token_id: id.to_string(),
        block_stamp: record.stamp,
        owner: true,
        metadata: Vec::new(),
    })?;
    Ok(Ok(()))
}

fn new_owner(ctx: &Context, record: &Record, id: &str) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "NEWOWNER"), Slp2Error::CostBelowFee("NEWOWNER"));

    let Some(mut token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp2Error::TokenPaused(id.to_string()));

    let Some(mut emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp2Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    let receiver = ctx.store.find_slp2_wallet(id, &record.receiver)?;
    let mut receiver = receiver.unwrap_or_else(|| Slp2Wallet {
        address: record.receiver.clone(),
        token_id: id.to_string(),
        block_stamp: record.stamp,
        owner: false,
        metadata: Vec::new(),
    });
    receiver.owner = true;
    receiver.block_stamp = record.stamp;
    ctx.store.upsert_slp2_wallet(&receiver)?;

    emitter.owner = false;
    emitter.block_stamp = record.stamp;
    ctx.store.upsert_slp2_wallet(&emitter)?;

    token.owner = record.receiver.clone();
    token.stamp = record.stamp;
    ctx.store.save_contract(&token)?;
    Ok(Ok(()))
}

/// Was the token declared pausable at genesis?
fn pausable(ctx: &Context, token_id: &str) -> Result<bool, EngineError> {
    match ctx.store.genesis_record(token_id)? {
        Some(Record {
            op: Payload::Slp2(Slp2Op::Genesis { pa, .. }),
            ..
        }) => Ok(pa),
        _ => Ok(false),
    }
}

fn set_paused(
    ctx: &Context,
    record: &Record,
    id: &str,
    paused: bool,
) -> Result<Checked, EngineError> {
    let op: &'static str = if paused { "PAUSE" } else { "RESUME" };
    if paused {
        ensure!(pausable(ctx, id)?, Slp2Error::NotPausable(id.to_string()));
    }
    ensure!(cost_ok(ctx, record, op), Slp2Error::CostBelowFee(op));
    ensure!(master_ok(ctx, record)?, Slp2Error::NotMasterAddress(op));

    let Some(mut token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    if paused {
        ensure!(!token.paused, Slp2Error::AlreadyPaused(id.to_string()));
    } else {
        ensure!(token.paused, Slp2Error::NotPaused(id.to_string()));
    }

    let Some(emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp2Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    token.paused = paused;
    token.stamp = record.stamp;
    ctx.store.save_contract(&token)?;
    Ok(Ok(()))
}

fn auth_meta(ctx: &Context, record: &Record, id: &str) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "AUTHMETA"), Slp2Error::CostBelowFee("AUTHMETA"));

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp2Error::TokenPaused(id.to_string()));

    let Some(emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp2Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    ensure!(
        ctx.store.find_slp2_wallet(id, &record.receiver)?.is_none(),
        Slp2Error::AlreadyAuthorized(record.receiver.clone())
    );

    ctx.store.insert_slp2_wallet(&Slp2Wallet {
        address: record.receiver.clone(),
        token_id: id.to_string(),
        block_stamp: record.stamp,
        owner: false,
        metadata: Vec::new(),
    })?;
    Ok(Ok(()))
}

fn revoke_meta(ctx: &Context, record: &Record, id: &str) -> Result<Checked, EngineError> {
    ensure!(
        cost_ok(ctx, record, "REVOKEMETA"),
        Slp2Error::CostBelowFee("REVOKEMETA")
    );

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp2Error::TokenPaused(id.to_string()));

    let Some(emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp2Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    ensure!(
        ctx.store.find_slp2_wallet(id, &record.receiver)?.is_some(),
        Slp2Error::AlreadyRevoked(record.receiver.clone())
    );

    ctx.store.delete_slp2_wallet(id, &record.receiver)?;
    Ok(Ok(()))
}

fn add_meta(
    ctx: &Context,
    record: &Record,
    id: &str,
    na: Option<&str>,
    dt: &str,
) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "ADDMETA"), Slp2Error::CostBelowFee("ADDMETA"));
    ensure!(master_ok(ctx, record)?, Slp2Error::NotMasterAddress("ADDMETA"));

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp2Error::TokenPaused(id.to_string()));

    // any authorised editor may append, not only the owner
    let Some(mut emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    let bag = match na {
        Some(key) if !key.is_empty() => {
            BTreeMap::from([(key.to_string(), dt.to_string())])
        }
        _ => match meta_bag(dt) {
            Some(bag) => bag,
            None => return Ok(Err(Slp2Error::MetadataNotDict.into())),
        },
    };
    let Ok(packed) = pack_meta(&bag) else {
        return Ok(Err(Slp2Error::MetadataNotDict.into()));
    };

    emitter.metadata.extend_from_slice(&packed);
    emitter.block_stamp = record.stamp;
    ctx.store.upsert_slp2_wallet(&emitter)?;
    Ok(Ok(()))
}

fn void_meta(ctx: &Context, record: &Record, id: &str, tx: &str) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "VOIDMETA"), Slp2Error::CostBelowFee("VOIDMETA"));
    ensure!(master_ok(ctx, record)?, Slp2Error::NotMasterAddress("VOIDMETA"));

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp2Error::TokenPaused(id.to_string()));

    let Some(mut emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    let Some(reference) = ctx.store.record_by_txid(tx)? else {
        return Ok(Err(Slp2Error::ReferenceNotFound(tx.to_string()).into()));
    };
    let keys: Vec<String> = match &reference.op {
        Payload::Slp2(Slp2Op::AddMeta { na: Some(key), .. }) if !key.is_empty() => {
            vec![key.clone()]
        }
        Payload::Slp2(Slp2Op::AddMeta { dt, .. }) => match meta_bag(dt) {
            Some(bag) => bag.into_keys().collect(),
            None => return Ok(Err(Slp2Error::MetadataNotDict.into())),
        },
        _ => return Ok(Err(Slp2Error::MetadataNotDict.into())),
    };

    let mut bag = unpack_meta(&emitter.metadata)?;
    for key in keys {
        bag.remove(&key);
    }
    let Ok(packed) = pack_meta(&bag) else {
        return Ok(Err(Slp2Error::MetadataNotDict.into()));
    };

    emitter.metadata = packed;
    emitter.block_stamp = record.stamp;
    ctx.store.upsert_slp2_wallet(&emitter)?;
    Ok(Ok(()))
}

fn clone_token(ctx: &Context, record: &Record, id: &str) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "CLONE"), Slp2Error::CostBelowFee("CLONE"));
    ensure!(master_ok(ctx, record)?, Slp2Error::NotMasterAddress("CLONE"));

    let Some(genesis) = ctx.store.genesis_record(id)? else {
        return Ok(Err(Slp2Error::GenesisNotFound(id.to_string()).into()));
    };
    let Payload::Slp2(Slp2Op::Genesis { sy, na, du, no, .. }) = &genesis.op else {
        return Ok(Err(Slp2Error::GenesisNotFound(id.to_string()).into()));
    };

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp2Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp2Error::TokenPaused(id.to_string()));

    let Some(emitter) = ctx.store.find_slp2_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp2Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp2Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp2Error::StampTooLow(record.stamp.to_string())
    );

    let new_id = slp_crypto::token_id(
        record.family().as_str(),
        sy,
        record.stamp.height,
        &record.txid,
    );

    // the clone's owner wallet aggregates every editor's current blob
    let mut metadata = Vec::new();
    for wallet in ctx.store.slp2_wallets(id)? {
        metadata.extend_from_slice(&wallet.metadata);
    }

    let contract = Contract {
        token_id: new_id.clone(),
        stamp: record.stamp,
        slp_type: record.family(),
        name: na.clone(),
        symbol: sy.clone(),
        owner: emitter.address.clone(),
        document: du.clone(),
        notes: no.clone(),
        paused: false,
        de: 0,
        supply: None,
    };
    match ctx.store.insert_contract(&contract) {
        Ok(()) => {}
        Err(slp_db::kvtable::Error::Exists) => {
            return Ok(Err(Slp2Error::TokenIdCollision.into()))
        }
        Err(e) => return Err(e.into()),
    }

    ctx.store.insert_slp2_wallet(&Slp2Wallet {
        address: emitter.address.clone(),
        token_id: new_id,
        block_stamp: record.stamp,
        owner: true,
        metadata,
    })?;
    Ok(Ok(()))
}

/// Reads `dt` as a JSON object of string values.
fn meta_bag(dt: &str) -> Option<BTreeMap<String, String>> {
    let value: Value = serde_json::from_str(dt).ok()?;
    let object = value.as_object()?;
    object
        .iter()
        .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}
