//! In-memory storage backend for tests.
//!
//! Transactions buffer their writes and record the version of every account
//! they read. Commit fails with `SerializationConflict` if any of those
//! accounts changed since it was read (first committer wins), which gives the
//! same observable outcome as PostgreSQL `SERIALIZABLE` for this workload.
//!
//! Commit failures can be injected to exercise the retry path.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::models::account::BankAccount;
use crate::models::transfer::{NewTransfer, Transfer};
use crate::storage::{
    AccountLookup, AccountStore, Database, HealthProbe, StorageError, TransferStore,
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<i64, VersionedAccount>,
    transfers: Vec<Transfer>,
    next_account_id: i64,
    next_transfer_id: i64,
    commit_faults: VecDeque<StorageError>,
    read_faults: VecDeque<StorageError>,
    persistent_fault: Option<StorageError>,
    begins: u32,
}

#[derive(Debug, Clone)]
struct VersionedAccount {
    account: BankAccount,
    version: u64,
}

/// Shared in-memory database. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

/// Open in-memory transaction; dropping it discards the buffered writes.
#[derive(Debug)]
pub struct MemoryTx {
    state: Arc<Mutex<State>>,
    read_versions: HashMap<i64, u64>,
    account_writes: HashMap<i64, BankAccount>,
    transfer_writes: Vec<NewTransfer>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision an account and return it with its assigned id.
    pub async fn insert_account(
        &self,
        organization_name: &str,
        iban: &str,
        bic: &str,
        balance_cents: i64,
    ) -> BankAccount {
        let mut state = self.state.lock().await;
        state.next_account_id += 1;
        let account = BankAccount {
            id: state.next_account_id,
            organization_name: organization_name.to_string(),
            balance_cents,
            iban: iban.to_string(),
            bic: bic.to_string(),
        };
        state.accounts.insert(
            account.id,
            VersionedAccount {
                account: account.clone(),
                version: 0,
            },
        );
        account
    }

    /// Committed state of the account with the given IBAN.
    pub async fn account(&self, iban: &str) -> Option<BankAccount> {
        let state = self.state.lock().await;
        state
            .accounts
            .values()
            .find(|v| v.account.iban == iban)
            .map(|v| v.account.clone())
    }

    /// Committed transfers debiting the given account, in insertion order.
    pub async fn transfers_for(&self, bank_account_id: i64) -> Vec<Transfer> {
        let state = self.state.lock().await;
        state
            .transfers
            .iter()
            .filter(|t| t.bank_account_id == bank_account_id)
            .cloned()
            .collect()
    }

    /// Make the next `count` commits fail with `error`.
    pub async fn fail_next_commits(&self, count: usize, error: StorageError) {
        let mut state = self.state.lock().await;
        state
            .commit_faults
            .extend(std::iter::repeat_n(error, count));
    }

    /// Make the next `count` account reads inside a transaction fail with `error`.
    pub async fn fail_next_reads(&self, count: usize, error: StorageError) {
        let mut state = self.state.lock().await;
        state.read_faults.extend(std::iter::repeat_n(error, count));
    }

    /// Make every commit fail with `error`.
    pub async fn fail_all_commits(&self, error: StorageError) {
        self.state.lock().await.persistent_fault = Some(error);
    }

    /// Number of transactions opened so far.
    pub async fn begin_count(&self) -> u32 {
        self.state.lock().await.begins
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Tx = MemoryTx;

    async fn begin_serializable(&self) -> Result<MemoryTx, StorageError> {
        self.state.lock().await.begins += 1;
        Ok(MemoryTx {
            state: Arc::clone(&self.state),
            read_versions: HashMap::new(),
            account_writes: HashMap::new(),
            transfer_writes: Vec::new(),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;

        if let Some(error) = state.persistent_fault.clone() {
            return Err(error);
        }
        if let Some(error) = state.commit_faults.pop_front() {
            return Err(error);
        }

        let stale = tx
            .read_versions
            .iter()
            .any(|(id, version)| state.accounts.get(id).map(|v| v.version) != Some(*version));
        if stale {
            return Err(StorageError::SerializationConflict);
        }

        for (id, account) in tx.account_writes {
            if let Some(entry) = state.accounts.get_mut(&id) {
                entry.account = account;
                entry.version += 1;
            }
        }
        for transfer in tx.transfer_writes {
            state.next_transfer_id += 1;
            let id = state.next_transfer_id;
            state.transfers.push(Transfer {
                id,
                counterparty_name: transfer.counterparty_name,
                counterparty_iban: transfer.counterparty_iban,
                counterparty_bic: transfer.counterparty_bic,
                amount_cents: transfer.amount_cents,
                bank_account_id: transfer.bank_account_id,
                description: transfer.description,
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for MemoryDatabase {
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[async_trait]
impl AccountLookup for MemoryDatabase {
    async fn find_by_iban(&self, iban: &str) -> Result<BankAccount, StorageError> {
        self.account(iban).await.ok_or_else(|| StorageError::NotFound {
            entity: "bank account",
            key: iban.to_string(),
        })
    }

    async fn list_transfers(&self, bank_account_id: i64) -> Result<Vec<Transfer>, StorageError> {
        Ok(self.transfers_for(bank_account_id).await)
    }
}

/// `AccountStore` over `MemoryTx`.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccounts;

#[async_trait]
impl AccountStore<MemoryTx> for MemoryAccounts {
    async fn get_by_iban(
        &self,
        tx: &mut MemoryTx,
        iban: &str,
    ) -> Result<BankAccount, StorageError> {
        if let Some(account) = tx.account_writes.values().find(|a| a.iban == iban) {
            return Ok(account.clone());
        }

        let mut state = tx.state.lock().await;
        if let Some(error) = state.read_faults.pop_front() {
            return Err(error);
        }
        let entry = state
            .accounts
            .values()
            .find(|v| v.account.iban == iban)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity: "bank account",
                key: iban.to_string(),
            })?;
        drop(state);

        tx.read_versions.insert(entry.account.id, entry.version);
        Ok(entry.account)
    }

    async fn update(&self, tx: &mut MemoryTx, account: &BankAccount) -> Result<(), StorageError> {
        let exists = tx.state.lock().await.accounts.contains_key(&account.id);
        if !exists {
            return Err(StorageError::NotFound {
                entity: "bank account",
                key: account.id.to_string(),
            });
        }
        tx.account_writes.insert(account.id, account.clone());
        Ok(())
    }
}

/// `TransferStore` over `MemoryTx`.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransfers;

#[async_trait]
impl TransferStore<MemoryTx> for MemoryTransfers {
    async fn create_bulk(
        &self,
        tx: &mut MemoryTx,
        transfers: &[NewTransfer],
    ) -> Result<(), StorageError> {
        tx.transfer_writes.extend_from_slice(transfers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_transfer(bank_account_id: i64, amount_cents: i64) -> NewTransfer {
        NewTransfer {
            counterparty_name: "Bip Bip".to_string(),
            counterparty_iban: "EE383680981021245685".to_string(),
            counterparty_bic: "CRLYFRPPTOU".to_string(),
            amount_cents,
            bank_account_id,
            description: "Wonderland/4410".to_string(),
        }
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let db = MemoryDatabase::new();
        let acc = db.insert_account("ACME", "IBAN1", "BIC1", 100).await;

        let mut tx = db.begin_serializable().await.unwrap();
        MemoryTransfers
            .create_bulk(&mut tx, &[new_transfer(acc.id, 10)])
            .await
            .unwrap();
        db.rollback(tx).await.unwrap();

        assert!(db.transfers_for(acc.id).await.is_empty());
    }

    #[tokio::test]
    async fn commit_assigns_sequential_ids() {
        let db = MemoryDatabase::new();
        let acc = db.insert_account("ACME", "IBAN1", "BIC1", 100).await;

        let mut tx = db.begin_serializable().await.unwrap();
        MemoryTransfers
            .create_bulk(&mut tx, &[new_transfer(acc.id, 10), new_transfer(acc.id, 20)])
            .await
            .unwrap();
        db.commit(tx).await.unwrap();

        let ids: Vec<i64> = db.transfers_for(acc.id).await.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn second_committer_on_same_account_conflicts() {
        let db = MemoryDatabase::new();
        db.insert_account("ACME", "IBAN1", "BIC1", 100).await;

        let mut first = db.begin_serializable().await.unwrap();
        let mut second = db.begin_serializable().await.unwrap();
        let a = MemoryAccounts.get_by_iban(&mut first, "IBAN1").await.unwrap();
        let b = MemoryAccounts.get_by_iban(&mut second, "IBAN1").await.unwrap();

        MemoryAccounts
            .update(&mut first, &a.debited(60).unwrap())
            .await
            .unwrap();
        MemoryAccounts
            .update(&mut second, &b.debited(60).unwrap())
            .await
            .unwrap();

        db.commit(first).await.unwrap();
        assert_eq!(
            db.commit(second).await,
            Err(StorageError::SerializationConflict)
        );
        assert_eq!(db.account("IBAN1").await.unwrap().balance_cents, 40);
    }

    #[tokio::test]
    async fn unknown_iban_is_not_found() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin_serializable().await.unwrap();
        assert!(matches!(
            MemoryAccounts.get_by_iban(&mut tx, "NOPE").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
