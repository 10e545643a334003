use std::path::Path;
use std::sync::Arc;

use rocksdb::Options;

use slp_crypto::Digest;

use crate::kvtable::{DBStamp, DBText, DBWalletKey, Error, KVTable, DB};
use crate::model::{BlockStamp, Contract, Record, RejectedRecord, Slp1Wallet, Slp2Wallet};

mod journal;
mod tokens;

#[cfg(test)]
mod tests;

// blockstamp => record
pub struct JournalKV;

impl KVTable<DBStamp, Record> for JournalKV {
    const CF_NAME: &'static str = "journal";
}

// token id => contract
pub struct ContractKV;

impl KVTable<DBText, Contract> for ContractKV {
    const CF_NAME: &'static str = "contracts";
}

// (token id, address) => fungible wallet
pub struct Slp1KV;

impl KVTable<DBWalletKey, Slp1Wallet> for Slp1KV {
    const CF_NAME: &'static str = "slp1";
}

// (token id, address) => metadata wallet
pub struct Slp2KV;

impl KVTable<DBWalletKey, Slp2Wallet> for Slp2KV {
    const CF_NAME: &'static str = "slp2";
}

// blockstamp => refused record + comment
pub struct RejectedKV;

impl KVTable<DBStamp, RejectedRecord> for RejectedKV {
    const CF_NAME: &'static str = "rejected";
}

// token id => stamp of its genesis record
pub struct GenesisKV;

impl KVTable<DBText, BlockStamp> for GenesisKV {
    const CF_NAME: &'static str = "genesis";
}

// txid => stamp
pub struct TxidKV;

impl KVTable<DBText, BlockStamp> for TxidKV {
    const CF_NAME: &'static str = "txids";
}

// bookkeeping (per-family poh heads)
pub struct MetaKV;

impl KVTable<DBText, String> for MetaKV {
    const CF_NAME: &'static str = "meta";
}

/// Handle over the node's RocksDB instance.
///
/// Mutations arrive from the single-threaded block parser, so writes never
/// race; clones share the same underlying database for readers.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<DB>,
    pub(crate) digest: Digest,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, digest: Digest) -> Result<Self, Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(
            &opts,
            path,
            [
                JournalKV::CF_NAME,
                ContractKV::CF_NAME,
                Slp1KV::CF_NAME,
                Slp2KV::CF_NAME,
                RejectedKV::CF_NAME,
                GenesisKV::CF_NAME,
                TxidKV::CF_NAME,
                MetaKV::CF_NAME,
            ],
        )
        .map_err(|_| Error::IO)?;

        Ok(Self {
            db: Arc::new(db),
            digest,
        })
    }

    pub fn destroy(path: impl AsRef<Path>) -> Result<(), Error> {
        DB::destroy(&Options::default(), path).map_err(|_| Error::IO)
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }
}
