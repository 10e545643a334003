use rocksdb::Direction;
use tracing::warn;

use slp_codec::Family;
use slp_crypto::chain_poh;

use crate::kvtable::{DBStamp, DBText, EntryIterator, Error, KVTable};
use crate::model::{BlockStamp, Record, RejectedRecord};

use super::{GenesisKV, JournalKV, MetaKV, RejectedKV, Store, TxidKV};

fn poh_head_key(family: Family) -> DBText {
    DBText(format!("poh head {}", family.as_str()))
}

impl Store {
    /// Appends a freshly parsed record. Enforces blockstamp uniqueness and
    /// height-then-index append order; the record must still be unjudged.
    pub fn append_record(&self, record: &Record) -> Result<(), Error> {
        if record.legit.is_some() {
            return Err(Error::AlreadyJudged);
        }
        if let Some((DBStamp(last), _)) = JournalKV::last_entry(&self.db)? {
            if record.stamp <= last {
                return Err(Error::OutOfOrder);
            }
        }
        JournalKV::insert(&self.db, DBStamp(record.stamp), record.clone())?;
        TxidKV::upsert(&self.db, DBText(record.txid.clone()), record.stamp)?;
        if record.op.is_genesis() {
            match GenesisKV::insert(&self.db, DBText(record.token_id().to_string()), record.stamp)
            {
                Ok(()) => {}
                Err(Error::Exists) => {
                    warn!(token = record.token_id(), "token id collision on genesis")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn find_record(&self, stamp: BlockStamp) -> Result<Option<Record>, Error> {
        JournalKV::get(&self.db, DBStamp(stamp))
    }

    /// The genesis record a token id points back to, judged or not.
    pub fn genesis_record(&self, token_id: &str) -> Result<Option<Record>, Error> {
        match GenesisKV::get(&self.db, DBText(token_id.to_string()))? {
            None => Ok(None),
            Some(stamp) => self.find_record(stamp),
        }
    }

    pub fn record_by_txid(&self, txid: &str) -> Result<Option<Record>, Error> {
        match TxidKV::get(&self.db, DBText(txid.to_string()))? {
            None => Ok(None),
            Some(stamp) => self.find_record(stamp),
        }
    }

    /// Stamp of the newest journal entry, if any.
    pub fn tip(&self) -> Result<Option<BlockStamp>, Error> {
        Ok(JournalKV::last_entry(&self.db)?.map(|(DBStamp(stamp), _)| stamp))
    }

    /// Settles a record's `legit` flag, exactly once.
    ///
    /// A record ruled legit receives its proof-of-history here: the chain
    /// step over the previous legit record of the same family. Rejected
    /// records stay out of the chain.
    pub fn set_legit(&self, stamp: BlockStamp, legit: bool) -> Result<Record, Error> {
        let mut record = self.find_record(stamp)?.ok_or(Error::NotFound)?;
        if record.legit.is_some() {
            return Err(Error::AlreadyJudged);
        }
        record.legit = Some(legit);
        if legit {
            let family = record.family();
            let previous = self.last_poh(family)?.unwrap_or_default();
            let poh = chain_poh(self.digest, &previous, &record.seed(self.digest));
            record.poh = Some(poh.clone());
            MetaKV::upsert(&self.db, poh_head_key(family), poh)?;
        }
        JournalKV::upsert(&self.db, DBStamp(stamp), record.clone())?;
        Ok(record)
    }

    /// Head of a family's proof-of-history chain.
    pub fn last_poh(&self, family: Family) -> Result<Option<String>, Error> {
        MetaKV::get(&self.db, poh_head_key(family))
    }

    /// PoH of the latest legit record strictly before `stamp`, used to
    /// answer consensus messages about that position.
    pub fn previous_legit_poh(
        &self,
        family: Family,
        stamp: BlockStamp,
    ) -> Result<Option<String>, Error> {
        let iter = JournalKV::iter_from(&self.db, DBStamp(stamp), Direction::Reverse)?;
        for item in iter {
            let (DBStamp(at), record) = item?;
            if at >= stamp || record.family() != family {
                continue;
            }
            if record.legit == Some(true) {
                return Ok(record.poh);
            }
        }
        Ok(None)
    }

    /// Copies a refused record beside its rejection cause.
    pub fn reject(&self, record: &Record, comment: &str) -> Result<(), Error> {
        RejectedKV::upsert(
            &self.db,
            DBStamp(record.stamp),
            RejectedRecord {
                record: record.clone(),
                comment: comment.to_string(),
            },
        )
    }

    pub fn find_rejected(&self, stamp: BlockStamp) -> Result<Option<RejectedRecord>, Error> {
        RejectedKV::get(&self.db, DBStamp(stamp))
    }

    /// Walks the journal in blockstamp order.
    pub fn crawl(&self) -> Result<EntryIterator<'_, DBStamp, Record>, Error> {
        JournalKV::iter_from(&self.db, DBStamp(BlockStamp::origin()), Direction::Forward)
    }
}
