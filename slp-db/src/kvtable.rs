//! Typed key/value tables over RocksDB column families
//!
//! Each collection implements [`KVTable`] with a key wrapper that defines
//! its byte encoding. Key encodings are chosen so that the natural iteration
//! order of the column family matches the domain order (journal entries by
//! blockstamp, wallets grouped by token).

use std::marker::PhantomData;

use rocksdb::{Direction, IteratorMode, DBWithThreadMode, MultiThreaded};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::model::BlockStamp;

pub type DB = DBWithThreadMode<MultiThreaded>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage IO error")]
    IO,

    #[error("document encoding error")]
    Serde,

    #[error("document not found")]
    NotFound,

    #[error("document already exists")]
    Exists,

    #[error("record appended out of order")]
    OutOfOrder,

    #[error("record legit flag already settled")]
    AlreadyJudged,
}

/// Journal / rejected key: big-endian `(height, index)` so lexicographic
/// order equals blockstamp order.
pub struct DBStamp(pub BlockStamp);

impl From<DBStamp> for Box<[u8]> {
    fn from(value: DBStamp) -> Self {
        let mut raw = [0u8; 10];
        raw[..8].copy_from_slice(&value.0.height.to_be_bytes());
        raw[8..].copy_from_slice(&value.0.index.to_be_bytes());
        Box::new(raw)
    }
}

impl From<Box<[u8]>> for DBStamp {
    fn from(value: Box<[u8]>) -> Self {
        let mut height = [0u8; 8];
        let mut index = [0u8; 2];
        height.copy_from_slice(&value[..8]);
        index.copy_from_slice(&value[8..10]);
        Self(BlockStamp::new(
            u64::from_be_bytes(height),
            u16::from_be_bytes(index),
        ))
    }
}

/// Plain text key (token ids, txids, meta entries).
pub struct DBText(pub String);

impl From<DBText> for Box<[u8]> {
    fn from(value: DBText) -> Self {
        value.0.into_bytes().into()
    }
}

impl From<Box<[u8]>> for DBText {
    fn from(value: Box<[u8]>) -> Self {
        Self(String::from_utf8_lossy(&value).into_owned())
    }
}

/// Wallet key: 32 hex chars of token id followed by the address, so one
/// token's wallets form a contiguous range.
pub struct DBWalletKey {
    pub token_id: String,
    pub address: String,
}

impl DBWalletKey {
    pub fn new(token_id: &str, address: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
            address: address.to_string(),
        }
    }
}

impl From<DBWalletKey> for Box<[u8]> {
    fn from(value: DBWalletKey) -> Self {
        let mut raw = Vec::with_capacity(32 + value.address.len());
        raw.extend_from_slice(value.token_id.as_bytes());
        raw.extend_from_slice(value.address.as_bytes());
        raw.into()
    }
}

impl From<Box<[u8]>> for DBWalletKey {
    fn from(value: Box<[u8]>) -> Self {
        let split = value.len().min(32);
        Self {
            token_id: String::from_utf8_lossy(&value[..split]).into_owned(),
            address: String::from_utf8_lossy(&value[split..]).into_owned(),
        }
    }
}

/// Bincode-encoded document value.
#[derive(Debug)]
pub struct DBSerde<V>(pub V);

impl<V: Serialize> TryFrom<DBSerde<V>> for Box<[u8]> {
    type Error = Error;

    fn try_from(value: DBSerde<V>) -> Result<Self, Error> {
        bincode::serialize(&value.0)
            .map(Vec::into_boxed_slice)
            .map_err(|_| Error::Serde)
    }
}

impl<V: DeserializeOwned> TryFrom<Box<[u8]>> for DBSerde<V> {
    type Error = Error;

    fn try_from(value: Box<[u8]>) -> Result<Self, Error> {
        bincode::deserialize(&value).map(DBSerde).map_err(|_| Error::Serde)
    }
}

/// One typed column family.
pub trait KVTable<K, V>
where
    K: Into<Box<[u8]>> + From<Box<[u8]>>,
    V: Serialize + DeserializeOwned,
{
    const CF_NAME: &'static str;

    fn cf(db: &DB) -> Result<std::sync::Arc<rocksdb::BoundColumnFamily<'_>>, Error> {
        db.cf_handle(Self::CF_NAME).ok_or(Error::IO)
    }

    fn get(db: &DB, key: K) -> Result<Option<V>, Error> {
        let cf = Self::cf(db)?;
        let raw_key: Box<[u8]> = key.into();
        let raw = db.get_cf(&cf, raw_key).map_err(|_| Error::IO)?;
        match raw {
            None => Ok(None),
            Some(bytes) => {
                let value: DBSerde<V> = bytes.into_boxed_slice().try_into()?;
                Ok(Some(value.0))
            }
        }
    }

    fn upsert(db: &DB, key: K, value: V) -> Result<(), Error> {
        let cf = Self::cf(db)?;
        let raw_key: Box<[u8]> = key.into();
        let raw: Box<[u8]> = DBSerde(value).try_into()?;
        db.put_cf(&cf, raw_key, raw).map_err(|_| Error::IO)
    }

    /// Insert that refuses to overwrite, backing the unique indices.
    fn insert(db: &DB, key: K, value: V) -> Result<(), Error> {
        let cf = Self::cf(db)?;
        let raw_key: Box<[u8]> = key.into();
        if db.get_cf(&cf, &raw_key).map_err(|_| Error::IO)?.is_some() {
            return Err(Error::Exists);
        }
        let raw: Box<[u8]> = DBSerde(value).try_into()?;
        db.put_cf(&cf, raw_key, raw).map_err(|_| Error::IO)
    }

    fn delete(db: &DB, key: K) -> Result<(), Error> {
        let cf = Self::cf(db)?;
        let raw_key: Box<[u8]> = key.into();
        db.delete_cf(&cf, raw_key).map_err(|_| Error::IO)
    }

    fn last_entry(db: &DB) -> Result<Option<(K, V)>, Error> {
        let cf = Self::cf(db)?;
        let mut iter = db.iterator_cf(&cf, IteratorMode::End);
        match iter.next() {
            None => Ok(None),
            Some(item) => {
                let (key, value) = item.map_err(|_| Error::IO)?;
                let value: DBSerde<V> = value.try_into()?;
                Ok(Some((K::from(key), value.0)))
            }
        }
    }

    fn iter_from<'a>(
        db: &'a DB,
        key: K,
        direction: Direction,
    ) -> Result<EntryIterator<'a, K, V>, Error> {
        let cf = Self::cf(db)?;
        let raw: Box<[u8]> = key.into();
        let inner = db.iterator_cf(&cf, IteratorMode::From(&raw, direction));
        Ok(EntryIterator(inner, PhantomData))
    }

    fn iter_prefix<'a>(db: &'a DB, prefix: Vec<u8>) -> Result<PrefixIterator<'a, K, V>, Error> {
        let cf = Self::cf(db)?;
        let inner = db.iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
        Ok(PrefixIterator(inner, prefix, PhantomData))
    }
}

pub struct EntryIterator<'a, K, V>(
    rocksdb::DBIteratorWithThreadMode<'a, DB>,
    PhantomData<(K, V)>,
);

impl<K, V> Iterator for EntryIterator<'_, K, V>
where
    K: From<Box<[u8]>>,
    V: DeserializeOwned,
{
    type Item = Result<(K, V), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.0.next()?;
        Some(item.map_err(|_| Error::IO).and_then(|(key, value)| {
            let value: DBSerde<V> = value.try_into()?;
            Ok((K::from(key), value.0))
        }))
    }
}

pub struct PrefixIterator<'a, K, V>(
    rocksdb::DBIteratorWithThreadMode<'a, DB>,
    Vec<u8>,
    PhantomData<(K, V)>,
);

impl<K, V> Iterator for PrefixIterator<'_, K, V>
where
    K: From<Box<[u8]>>,
    V: DeserializeOwned,
{
    type Item = Result<(K, V), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.0.next()?;
        match item {
            Err(_) => Some(Err(Error::IO)),
            Ok((key, value)) => {
                if !key.starts_with(&self.1) {
                    return None;
                }
                let value: Result<DBSerde<V>, Error> = value.try_into();
                Some(value.map(|v| (K::from(key), v.0)))
            }
        }
    }
}
