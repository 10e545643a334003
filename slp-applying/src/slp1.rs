//! SLP1 (fungible token) handlers

use slp_codec::{Payload, Slp1Op};
use slp_db::{Contract, Record, Slp1Wallet, TokenSupply};
use slp_math::Decimal;

use crate::rejection::Slp1Error;
use crate::{ensure, Checked, Context, EngineError};

pub(crate) fn apply(ctx: &Context, record: &Record, op: &Slp1Op) -> Result<Checked, EngineError> {
    match op {
        Slp1Op::Genesis { id, de, qt, sy, na, du, no, mi, .. } => {
            genesis(ctx, record, id, *de, qt, sy, na, du, no, *mi)
        }
        Slp1Op::Burn { id, qt, .. } => burn(ctx, record, id, qt),
        Slp1Op::Mint { id, qt, .. } => mint(ctx, record, id, qt),
        Slp1Op::Send { id, qt, .. } => send(ctx, record, id, qt),
        Slp1Op::NewOwner { id, .. } => new_owner(ctx, record, id),
        Slp1Op::Freeze { id, .. } => set_frozen(ctx, record, id, true),
        Slp1Op::Unfreeze { id, .. } => set_frozen(ctx, record, id, false),
        Slp1Op::Pause { id, .. } => set_paused(ctx, record, id, true),
        Slp1Op::Resume { id, .. } => set_paused(ctx, record, id, false),
    }
}

fn cost_ok(ctx: &Context, record: &Record, op: &'static str) -> bool {
    record.cost >= ctx.config.cost("_slp1", op, Some(record.stamp.height))
}

fn master_ok(ctx: &Context, record: &Record) -> Result<bool, EngineError> {
    Ok(record.receiver == ctx.config.master_address()?)
}

/// Was the token declared with the given flag at genesis?
fn genesis_flag(
    ctx: &Context,
    token_id: &str,
    flag: fn(bool, bool) -> bool,
) -> Result<bool, EngineError> {
    match ctx.store.genesis_record(token_id)? {
        Some(Record {
            op: Payload::Slp1(Slp1Op::Genesis { pa, mi, .. }),
            ..
        }) => Ok(flag(pa, mi)),
        _ => Ok(false),
    }
}

#[allow(clippy::too_many_arguments)]
fn genesis(
    ctx: &Context,
    record: &Record,
    id: &str,
    de: u8,
    qt: &Decimal,
    sy: &str,
    na: &str,
    du: &str,
    no: &str,
    mi: bool,
) -> Result<Checked, EngineError> {
    ensure!(qt.is_integral(), Slp1Error::QuantityNotIntegral("initial"));
    ensure!(cost_ok(ctx, record, "GENESIS"), Slp1Error::CostBelowFee("GENESIS"));
    ensure!(master_ok(ctx, record)?, Slp1Error::NotMasterAddress("GENESIS"));

    let global = qt.rescale(de)?;
    let minted = if mi { Decimal::zero(de) } else { global };

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
        de,
        supply: Some(TokenSupply {
            global,
            minted,
            burned: Decimal::zero(de),
            crossed: Decimal::zero(de),
        }),
    };
    match ctx.store.insert_contract(&contract) {
        Ok(()) => {}
        Err(slp_db::kvtable::Error::Exists) => {
            return Ok(Err(Slp1Error::TokenIdCollision.into()))
        }
        Err(e) => return Err(e.into()),
    }

    ctx.store.upsert_slp1_wallet(&Slp1Wallet {
        address: record.emitter.clone(),
        token_id: id.to_string(),
        block_stamp: record.stamp,
        balance: minted,
        owner: true,
        frozen: false,
    })?;
    Ok(Ok(()))
}

fn burn(ctx: &Context, record: &Record, id: &str, qt: &Decimal) -> Result<Checked, EngineError> {
    ensure!(qt.is_integral(), Slp1Error::QuantityNotIntegral("burn"));
    ensure!(cost_ok(ctx, record, "BURN"), Slp1Error::CostBelowFee("BURN"));
    ensure!(master_ok(ctx, record)?, Slp1Error::NotMasterAddress("BURN"));

    let Some(mut token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp1Error::TokenPaused(id.to_string()));

    let Some(mut wallet) = ctx.store.find_slp1_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(wallet.owner, Slp1Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > wallet.block_stamp,
        Slp1Error::StampTooLow(record.stamp.to_string())
    );

    let qt = qt.rescale_lossy(token.de)?;
    ensure!(wallet.balance >= qt, Slp1Error::BurnExceedsBalance);

    let Some(mut supply) = token.supply.clone() else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };

    wallet.balance = wallet.balance.checked_sub(&qt)?;
    wallet.block_stamp = record.stamp;
    ctx.store.upsert_slp1_wallet(&wallet)?;

    supply.burned = supply.burned.checked_add(&qt)?;
    token.supply = Some(supply);
    token.stamp = record.stamp;
    ctx.store.save_contract(&token)?;
    Ok(Ok(()))
}

fn mint(ctx: &Context, record: &Record, id: &str, qt: &Decimal) -> Result<Checked, EngineError> {
    ensure!(
        genesis_flag(ctx, id, |_, mi| mi)?,
        Slp1Error::NotMintable(id.to_string())
    );
    ensure!(qt.is_integral(), Slp1Error::QuantityNotIntegral("minted"));
    ensure!(cost_ok(ctx, record, "MINT"), Slp1Error::CostBelowFee("MINT"));
    ensure!(master_ok(ctx, record)?, Slp1Error::NotMasterAddress("MINT"));

    let Some(mut token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp1Error::TokenPaused(id.to_string()));

    let Some(mut wallet) = ctx.store.find_slp1_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(wallet.owner, Slp1Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > wallet.block_stamp,
        Slp1Error::StampTooLow(record.stamp.to_string())
    );

    let Some(mut supply) = token.supply.clone() else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };
    let qt = qt.rescale_lossy(token.de)?;
    let current = supply
        .minted
        .checked_add(&supply.burned)?
        .checked_add(&supply.crossed)?;
    ensure!(
        current.checked_add(&qt)? <= supply.global,
        Slp1Error::SupplyOverflow
    );

    wallet.balance = wallet.balance.checked_add(&qt)?;
    wallet.block_stamp = record.stamp;
    ctx.store.upsert_slp1_wallet(&wallet)?;

    supply.minted = supply.minted.checked_add(&qt)?;
    token.supply = Some(supply);
    token.stamp = record.stamp;
    ctx.store.save_contract(&token)?;
    Ok(Ok(()))
}

fn send(ctx: &Context, record: &Record, id: &str, qt: &Decimal) -> Result<Checked, EngineError> {
    ensure!(cost_ok(ctx, record, "SEND"), Slp1Error::CostBelowFee("SEND"));

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp1Error::TokenPaused(id.to_string()));

    let Some(emitter) = ctx.store.find_slp1_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(!emitter.frozen, Slp1Error::Frozen(record.emitter.clone()));

    let qt = qt.rescale_lossy(token.de)?;
    // strict: a send of the full balance is refused
    ensure!(
        emitter.balance > qt,
        Slp1Error::InsufficientBalance(record.emitter.clone())
    );
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp1Error::StampTooLow(record.stamp.to_string())
    );

    if !ctx
        .store
        .exchange_slp1_token(id, &record.emitter, &record.receiver, &qt)?
    {
        return Ok(Err(Slp1Error::ExchangeFailed.into()));
    }

    for address in [&record.emitter, &record.receiver] {
        if let Some(mut wallet) = ctx.store.find_slp1_wallet(id, address)? {
            wallet.block_stamp = record.stamp;
            ctx.store.upsert_slp1_wallet(&wallet)?;
        }
    }
    Ok(Ok(()))
}

fn new_owner(ctx: &Context, record: &Record, id: &str) -> Result<Checked, EngineError> {
    ensure!(
        cost_ok(ctx, record, "NEWOWNER"),
        Slp1Error::CostBelowFee("NEWOWNER")
    );

    let Some(mut token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };

    let Some(mut emitter) = ctx.store.find_slp1_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp1Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp1Error::StampTooLow(record.stamp.to_string())
    );

    if let Some(receiver) = ctx.store.find_slp1_wallet(id, &record.receiver)? {
        ensure!(!receiver.frozen, Slp1Error::Frozen(record.receiver.clone()));
    }

    if !ctx
        .store
        .exchange_slp1_token(id, &record.emitter, &record.receiver, &emitter.balance)?
    {
        return Ok(Err(Slp1Error::ExchangeFailed.into()));
    }

    // flags after the move: the whole balance now sits with the receiver
    emitter = match ctx.store.find_slp1_wallet(id, &record.emitter)? {
        Some(wallet) => wallet,
        None => emitter,
    };
    emitter.owner = false;
    emitter.block_stamp = record.stamp;
    ctx.store.upsert_slp1_wallet(&emitter)?;

    if let Some(mut receiver) = ctx.store.find_slp1_wallet(id, &record.receiver)? {
        receiver.owner = true;
        receiver.block_stamp = record.stamp;
        ctx.store.upsert_slp1_wallet(&receiver)?;
    }

    token.owner = record.receiver.clone();
    token.stamp = record.stamp;
    ctx.store.save_contract(&token)?;
    Ok(Ok(()))
}

fn set_frozen(
    ctx: &Context,
    record: &Record,
    id: &str,
    frozen: bool,
) -> Result<Checked, EngineError> {
    let op: &'static str = if frozen { "FREEZE" } else { "UNFREEZE" };
    ensure!(cost_ok(ctx, record, op), Slp1Error::CostBelowFee(op));

    let Some(token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };
    ensure!(!token.paused, Slp1Error::TokenPaused(id.to_string()));

    let Some(emitter) = ctx.store.find_slp1_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp1Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp1Error::StampTooLow(record.stamp.to_string())
    );

    let Some(mut receiver) = ctx.store.find_slp1_wallet(id, &record.receiver)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.receiver.clone()).into()));
    };
    if frozen {
        ensure!(
            !receiver.frozen,
            Slp1Error::AlreadyFrozen(record.receiver.clone())
        );
    } else {
        ensure!(receiver.frozen, Slp1Error::NotFrozen(record.receiver.clone()));
    }

    receiver.frozen = frozen;
    ctx.store.upsert_slp1_wallet(&receiver)?;
    Ok(Ok(()))
}

fn set_paused(
    ctx: &Context,
    record: &Record,
    id: &str,
    paused: bool,
) -> Result<Checked, EngineError> {
    let op: &'static str = if paused { "PAUSE" } else { "RESUME" };
    ensure!(
        genesis_flag(ctx, id, |pa, _| pa)?,
        Slp1Error::NotPausable(id.to_string())
    );
    ensure!(cost_ok(ctx, record, op), Slp1Error::CostBelowFee(op));
    ensure!(master_ok(ctx, record)?, Slp1Error::NotMasterAddress(op));

    let Some(mut token) = ctx.store.find_contract(id)? else {
        return Ok(Err(Slp1Error::TokenNotFound(id.to_string()).into()));
    };
    if paused {
        ensure!(!token.paused, Slp1Error::AlreadyPaused(id.to_string()));
    } else {
        ensure!(token.paused, Slp1Error::NotPaused(id.to_string()));
    }

    let Some(emitter) = ctx.store.find_slp1_wallet(id, &record.emitter)? else {
        return Ok(Err(Slp1Error::WalletNotFound(record.emitter.clone()).into()));
    };
    ensure!(emitter.owner, Slp1Error::NotOwner(record.emitter.clone()));
    ensure!(
        record.stamp > emitter.block_stamp,
        Slp1Error::StampTooLow(record.stamp.to_string())
    );

    token.paused = paused;
    token.stamp = record.stamp;
    ctx.store.save_contract(&token)?;
    Ok(Ok(()))
}
