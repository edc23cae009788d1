//! Storage boundary consumed by the transfer service.
//!
//! The service only sees three capabilities:
//! - `Database`: opens, commits and rolls back transactions
//! - `AccountStore`: reads and updates bank accounts inside a transaction
//! - `TransferStore`: inserts transfer batches inside a transaction
//!
//! Every repository call takes an explicit transaction handle. Failures are
//! reported as a `StorageError` whose variant decides retryability.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::account::BankAccount;
use crate::models::transfer::{NewTransfer, Transfer};

/// Storage failure, classified by kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Concurrent transactions could not be serialized (SQLSTATE 40001 / 40P01).
    #[error("serialization conflict")]
    SerializationConflict,

    /// The transaction was already committed, rolled back or aborted.
    #[error("transaction is closed or aborted")]
    TransactionClosed,

    /// Transient connectivity failure (I/O, pool timeout, pool closed).
    #[error("connection error: {0}")]
    Connection(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// COMMIT failed without a server verdict; the transaction may have been applied.
    #[error("commit outcome unknown: {0}")]
    CommitOutcomeUnknown(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    /// Whether the failed operation may be retried in a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::SerializationConflict
                | StorageError::TransactionClosed
                | StorageError::Connection(_)
        )
    }

    /// Reclassify a failure reported by COMMIT.
    ///
    /// Only a serialization conflict guarantees the server rolled the
    /// transaction back. A lost connection or a closed transaction leaves the
    /// outcome unknown, and retrying could apply the same batch twice.
    pub fn at_commit(self) -> Self {
        match self {
            StorageError::Connection(reason) => StorageError::CommitOutcomeUnknown(reason),
            StorageError::TransactionClosed => {
                StorageError::CommitOutcomeUnknown("transaction closed during commit".to_string())
            }
            other => other,
        }
    }
}

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const IN_FAILED_SQL_TRANSACTION: &str = "25P02";
const INVALID_TRANSACTION_STATE: &str = "25000";

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) => match db_err.code().as_deref() {
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                    StorageError::SerializationConflict
                }
                Some(IN_FAILED_SQL_TRANSACTION) | Some(INVALID_TRANSACTION_STATE) => {
                    StorageError::TransactionClosed
                }
                _ => StorageError::Database(db_err.message().to_string()),
            },
            sqlx::Error::Io(e) => StorageError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => StorageError::Connection("pool timed out".to_string()),
            sqlx::Error::PoolClosed => StorageError::Connection("pool closed".to_string()),
            sqlx::Error::WorkerCrashed => StorageError::Connection("worker crashed".to_string()),
            other => StorageError::Database(other.to_string()),
        }
    }
}

/// Transaction lifecycle of a storage backend.
#[async_trait]
pub trait Database: Send + Sync {
    /// Open transaction handle passed to repository calls.
    type Tx: Send + 'static;

    /// Open a transaction at `SERIALIZABLE` isolation.
    async fn begin_serializable(&self) -> Result<Self::Tx, StorageError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), StorageError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StorageError>;
}

/// Bank account persistence scoped to a transaction.
#[async_trait]
pub trait AccountStore<Tx: Send>: Send + Sync {
    /// Load the account with the given IBAN.
    ///
    /// Returns `StorageError::NotFound` if no account matches.
    async fn get_by_iban(&self, tx: &mut Tx, iban: &str) -> Result<BankAccount, StorageError>;

    /// Persist every mutable column of `account`.
    async fn update(&self, tx: &mut Tx, account: &BankAccount) -> Result<(), StorageError>;
}

/// Transfer persistence scoped to a transaction.
#[async_trait]
pub trait TransferStore<Tx: Send>: Send + Sync {
    /// Insert all transfers as one batch.
    async fn create_bulk(&self, tx: &mut Tx, transfers: &[NewTransfer])
    -> Result<(), StorageError>;
}

/// Account reads that open their own connection, for callers without a transaction.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn find_by_iban(&self, iban: &str) -> Result<BankAccount, StorageError>;

    /// Committed transfers debiting the account, oldest first.
    async fn list_transfers(&self, bank_account_id: i64) -> Result<Vec<Transfer>, StorageError>;
}

/// Liveness check used by the health endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), StorageError>;
}
