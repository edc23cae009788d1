//! Transfer service - Core business logic for bulk transfers.
//!
//! This service handles:
//! - Request validation before any storage access
//! - Serializable transaction management
//! - Sufficient-funds check and atomic debit
//! - Retry with backoff on serialization conflicts
//!
//! # Atomicity Guarantees
//!
//! One bulk transfer is one `SERIALIZABLE` transaction: the balance read,
//! the transfer inserts and the debit commit together or not at all.
//! Concurrent requests against the same account are serialized by the
//! database; the loser sees a serialization conflict and retries against
//! the updated balance.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::amount::format_amount;
use crate::models::transfer::{BulkTransferRequest, NewTransfer, total_amount};
use crate::services::backoff::calculate_backoff;
use crate::storage::{AccountStore, Database, StorageError, TransferStore};

/// Retry settings for the bulk transfer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound of any single delay
    pub max_delay: Duration,

    /// Total number of attempts, including the first one
    pub max_retries: u32,
}

/// Entry point used by the HTTP layer.
#[async_trait]
pub trait BulkTransferService: Send + Sync {
    /// Apply every transfer in `request` against the organization account, atomically.
    ///
    /// # Errors
    ///
    /// - `Validation`: a field is missing or an amount is out of range
    /// - `AccountNotFound`: no account has the organization IBAN
    /// - `InsufficientFunds`: the balance does not cover the total
    /// - `RetryExhausted`: retryable failures persisted for every attempt
    /// - `Storage`: a non-retryable storage failure
    /// - `Cancelled`: `cancel` fired before the request completed
    async fn bulk_transfer(
        &self,
        cancel: &CancellationToken,
        request: BulkTransferRequest,
    ) -> Result<(), AppError>;
}

/// How a single attempt ended, when it did not succeed.
#[derive(Debug)]
enum AttemptError {
    /// Terminal outcome reported to the caller as is.
    Rejected(AppError),
    Storage {
        operation: &'static str,
        source: StorageError,
    },
    Cancelled,
}

/// Orchestrates bulk transfers over a transactional storage backend.
pub struct TransferService<D, A, T> {
    db: D,
    accounts: A,
    transfers: T,
    retry: RetryConfig,
}

impl<D, A, T> TransferService<D, A, T>
where
    D: Database,
    A: AccountStore<D::Tx>,
    T: TransferStore<D::Tx>,
{
    pub fn new(db: D, accounts: A, transfers: T, retry: RetryConfig) -> Self {
        Self {
            db,
            accounts,
            transfers,
            retry,
        }
    }

    /// Run one attempt in its own transaction and return the debited total.
    async fn execute_bulk_transfer(
        &self,
        cancel: &CancellationToken,
        request: &BulkTransferRequest,
    ) -> Result<i64, AttemptError> {
        let mut tx = cancellable(cancel, "begin transaction", self.db.begin_serializable()).await?;

        match self.apply(cancel, &mut tx, request).await {
            Ok(total) => {
                // Not raced against cancellation: a started commit runs to completion
                self.db
                    .commit(tx)
                    .await
                    .map_err(|source| AttemptError::Storage {
                        operation: "commit",
                        source: source.at_commit(),
                    })?;
                Ok(total)
            }
            Err(err) => {
                if let Err(rollback_err) = self.db.rollback(tx).await {
                    warn!(error = %rollback_err, "Failed to roll back transaction");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        cancel: &CancellationToken,
        tx: &mut D::Tx,
        request: &BulkTransferRequest,
    ) -> Result<i64, AttemptError> {
        let account = cancellable(
            cancel,
            "load bank account",
            self.accounts.get_by_iban(tx, &request.organization_iban),
        )
        .await?;
        account
            .validate()
            .map_err(|e| AttemptError::Rejected(AppError::Validation(e)))?;

        let total = total_amount(&request.transfers)
            .map_err(|e| AttemptError::Rejected(AppError::Validation(e)))?;

        debug!(
            total_transfer = total,
            account_balance = account.balance_cents,
            "Transfer details"
        );

        if account.balance_cents < total {
            warn!(
                required = %format_amount(total),
                available = %format_amount(account.balance_cents),
                "Insufficient funds"
            );
            return Err(AttemptError::Rejected(AppError::InsufficientFunds {
                required: total,
                available: account.balance_cents,
            }));
        }

        let new_transfers: Vec<NewTransfer> = request
            .transfers
            .iter()
            .map(|intent| NewTransfer::from_intent(intent, account.id))
            .collect();

        cancellable(
            cancel,
            "create transfers",
            self.transfers.create_bulk(tx, &new_transfers),
        )
        .await?;

        let debited = account
            .debited(total)
            .map_err(|e| AttemptError::Rejected(AppError::Validation(e)))?;

        cancellable(
            cancel,
            "update account balance",
            self.accounts.update(tx, &debited),
        )
        .await?;

        Ok(total)
    }
}

#[async_trait]
impl<D, A, T> BulkTransferService for TransferService<D, A, T>
where
    D: Database,
    A: AccountStore<D::Tx>,
    T: TransferStore<D::Tx>,
{
    async fn bulk_transfer(
        &self,
        cancel: &CancellationToken,
        request: BulkTransferRequest,
    ) -> Result<(), AppError> {
        info!(
            organization_bic = %request.organization_bic,
            organization_iban = %request.organization_iban,
            transfer_count = request.transfers.len(),
            "Processing bulk transfer request"
        );

        request.validate()?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let (operation, source) = match self.execute_bulk_transfer(cancel, &request).await {
                Ok(total) => {
                    info!(
                        organization_bic = %request.organization_bic,
                        organization_iban = %request.organization_iban,
                        total_transfer = %format_amount(total),
                        attempt,
                        "Bulk transfer processed successfully"
                    );
                    return Ok(());
                }
                Err(AttemptError::Rejected(err)) => return Err(err),
                Err(AttemptError::Cancelled) => {
                    warn!(attempt, "Bulk transfer cancelled");
                    return Err(AppError::Cancelled);
                }
                Err(AttemptError::Storage { operation, source }) => (operation, source),
            };

            if !source.is_retryable() {
                error!(
                    operation,
                    error = %source,
                    organization_iban = %request.organization_iban,
                    attempt,
                    "Non-retryable error occurred during bulk transfer"
                );
                return Err(AppError::storage(operation, source));
            }

            if attempt >= self.retry.max_retries {
                error!(
                    operation,
                    error = %source,
                    max_retries = self.retry.max_retries,
                    "Failed to process bulk transfer after maximum retries"
                );
                return Err(AppError::RetryExhausted {
                    attempts: attempt,
                    source,
                });
            }

            let delay = calculate_backoff(self.retry.base_delay, self.retry.max_delay, attempt - 1);
            warn!(
                operation,
                error = %source,
                attempt,
                retry_after = ?delay,
                "Retryable error occurred during bulk transfer, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    warn!(attempt, "Bulk transfer cancelled while waiting to retry");
                    return Err(AppError::Cancelled);
                }
            }
        }
    }
}

/// Run a storage call unless `cancel` fires first.
async fn cancellable<F, R>(
    cancel: &CancellationToken,
    operation: &'static str,
    call: F,
) -> Result<R, AttemptError>
where
    F: Future<Output = Result<R, StorageError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AttemptError::Cancelled),
        result = call => result.map_err(|source| AttemptError::Storage { operation, source }),
    }
}
