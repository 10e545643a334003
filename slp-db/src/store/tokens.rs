use tracing::warn;

use slp_math::Decimal;

use crate::kvtable::{DBText, DBWalletKey, Error, KVTable};
use crate::model::{BlockStamp, Contract, Slp1Wallet, Slp2Wallet};

use super::{ContractKV, Slp1KV, Slp2KV, Store};

impl Store {
    /// Registers a new contract; token ids are unique.
    pub fn insert_contract(&self, contract: &Contract) -> Result<(), Error> {
        ContractKV::insert(&self.db, DBText(contract.token_id.clone()), contract.clone())
    }

    pub fn find_contract(&self, token_id: &str) -> Result<Option<Contract>, Error> {
        ContractKV::get(&self.db, DBText(token_id.to_string()))
    }

    pub fn save_contract(&self, contract: &Contract) -> Result<(), Error> {
        ContractKV::upsert(&self.db, DBText(contract.token_id.clone()), contract.clone())
    }

    pub fn find_slp1_wallet(
        &self,
        token_id: &str,
        address: &str,
    ) -> Result<Option<Slp1Wallet>, Error> {
        Slp1KV::get(&self.db, DBWalletKey::new(token_id, address))
    }

    pub fn upsert_slp1_wallet(&self, wallet: &Slp1Wallet) -> Result<(), Error> {
        Slp1KV::upsert(
            &self.db,
            DBWalletKey::new(&wallet.token_id, &wallet.address),
            wallet.clone(),
        )
    }

    pub fn insert_slp1_wallet(&self, wallet: &Slp1Wallet) -> Result<(), Error> {
        Slp1KV::insert(
            &self.db,
            DBWalletKey::new(&wallet.token_id, &wallet.address),
            wallet.clone(),
        )
    }

    pub fn find_slp2_wallet(
        &self,
        token_id: &str,
        address: &str,
    ) -> Result<Option<Slp2Wallet>, Error> {
        Slp2KV::get(&self.db, DBWalletKey::new(token_id, address))
    }

    pub fn upsert_slp2_wallet(&self, wallet: &Slp2Wallet) -> Result<(), Error> {
        Slp2KV::upsert(
            &self.db,
            DBWalletKey::new(&wallet.token_id, &wallet.address),
            wallet.clone(),
        )
    }

    pub fn insert_slp2_wallet(&self, wallet: &Slp2Wallet) -> Result<(), Error> {
        Slp2KV::insert(
            &self.db,
            DBWalletKey::new(&wallet.token_id, &wallet.address),
            wallet.clone(),
        )
    }

    pub fn delete_slp2_wallet(&self, token_id: &str, address: &str) -> Result<(), Error> {
        Slp2KV::delete(&self.db, DBWalletKey::new(token_id, address))
    }

    /// Every metadata wallet of a token, in address order.
    pub fn slp2_wallets(&self, token_id: &str) -> Result<Vec<Slp2Wallet>, Error> {
        let iter = Slp2KV::iter_prefix(&self.db, token_id.as_bytes().to_vec())?;
        iter.map(|item| item.map(|(_, wallet)| wallet)).collect()
    }

    /// Moves `qt` of a token between wallets, creating the receiver on
    /// first credit. The credit lands first; a failing debit takes it back.
    /// Returns whether both sides persisted.
    pub fn exchange_slp1_token(
        &self,
        token_id: &str,
        sender: &str,
        receiver: &str,
        qt: &Decimal,
    ) -> Result<bool, Error> {
        let Some(mut src) = self.find_slp1_wallet(token_id, sender)? else {
            warn!(%sender, %token_id, "sender wallet does not exist for exchange");
            return Ok(false);
        };

        let previous = self.find_slp1_wallet(token_id, receiver)?;
        let credited = match &previous {
            Some(wallet) => {
                let mut updated = wallet.clone();
                match wallet.balance.checked_add(qt) {
                    Ok(balance) => updated.balance = balance,
                    Err(_) => return Ok(false),
                }
                updated
            }
            None => Slp1Wallet {
                address: receiver.to_string(),
                token_id: token_id.to_string(),
                block_stamp: BlockStamp::origin(),
                balance: *qt,
                owner: false,
                frozen: false,
            },
        };
        self.upsert_slp1_wallet(&credited)?;

        let debited = src.balance.checked_sub(qt);
        match debited {
            Ok(balance) if !balance.is_negative() => {
                src.balance = balance;
                match self.upsert_slp1_wallet(&src) {
                    Ok(()) => Ok(true),
                    Err(e) => {
                        self.revert_credit(token_id, receiver, previous)?;
                        Err(e)
                    }
                }
            }
            _ => {
                self.revert_credit(token_id, receiver, previous)?;
                Ok(false)
            }
        }
    }

    fn revert_credit(
        &self,
        token_id: &str,
        receiver: &str,
        previous: Option<Slp1Wallet>,
    ) -> Result<(), Error> {
        match previous {
            Some(wallet) => self.upsert_slp1_wallet(&wallet),
            None => Slp1KV::delete(&self.db, DBWalletKey::new(token_id, receiver)),
        }
    }
}
