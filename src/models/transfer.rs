//! Transfer data models and bulk request types.
//!
//! This module defines:
//! - `Transfer`: Persisted outgoing transfer record
//! - `NewTransfer`: A transfer ready for insertion (no id yet)
//! - `TransferIntent` / `BulkTransferRequest`: Service-level input
//! - `BulkTransferFile` / `CreditTransfer`: The uploaded JSON document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::account::{ValidationError, require};
use crate::models::amount::{ParseAmountError, parse_amount};

/// Represents a transfer record from the database.
///
/// # Database Table
///
/// Maps to the `transfers` table. Rows are immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Transfer {
    /// Unique identifier assigned by the database (`BIGSERIAL`)
    pub id: i64,

    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,

    /// Amount in cents, always positive
    pub amount_cents: i64,

    /// Foreign key to the debited bank account
    pub bank_account_id: i64,

    pub description: String,

    /// Set by the database on insert
    pub created_at: DateTime<Utc>,
}

/// A transfer that has been validated and bound to an account, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,
    pub amount_cents: i64,
    pub bank_account_id: i64,
    pub description: String,
}

impl NewTransfer {
    /// Bind an intent to the account it debits.
    pub fn from_intent(intent: &TransferIntent, bank_account_id: i64) -> Self {
        Self {
            counterparty_name: intent.counterparty_name.clone(),
            counterparty_iban: intent.counterparty_iban.clone(),
            counterparty_bic: intent.counterparty_bic.clone(),
            amount_cents: intent.amount_cents,
            bank_account_id,
            description: intent.description.clone(),
        }
    }
}

/// One outgoing transfer requested as part of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub amount_cents: i64,
    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,
    pub description: String,
}

impl TransferIntent {
    /// Check that every counterparty field is present and the amount is positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("counterparty_name", &self.counterparty_name)?;
        require("counterparty_iban", &self.counterparty_iban)?;
        require("counterparty_bic", &self.counterparty_bic)?;
        require("description", &self.description)?;
        if self.amount_cents <= 0 {
            return Err(ValidationError::NonPositiveAmount(self.amount_cents));
        }
        Ok(())
    }
}

/// A batch of transfers debiting a single organization account.
///
/// The organization fields only locate the account; the IBAN is the lookup key.
#[derive(Debug, Clone)]
pub struct BulkTransferRequest {
    pub organization_name: String,
    pub organization_bic: String,
    pub organization_iban: String,
    pub transfers: Vec<TransferIntent>,
}

impl BulkTransferRequest {
    /// Validate the organization fields and every intent, in order.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` encountered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("organization_name", &self.organization_name)?;
        require("organization_bic", &self.organization_bic)?;
        require("organization_iban", &self.organization_iban)?;
        if self.transfers.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        self.transfers.iter().try_for_each(TransferIntent::validate)
    }
}

/// Sum transfer amounts, rejecting non-positive amounts and i64 overflow.
///
/// # Errors
///
/// - `NonPositiveAmount`: an amount is zero or negative
/// - `AmountOverflow`: the running total exceeds `i64::MAX`
pub fn total_amount(transfers: &[TransferIntent]) -> Result<i64, ValidationError> {
    transfers.iter().try_fold(0i64, |total, t| {
        if t.amount_cents <= 0 {
            return Err(ValidationError::NonPositiveAmount(t.amount_cents));
        }
        total
            .checked_add(t.amount_cents)
            .ok_or(ValidationError::AmountOverflow)
    })
}

/// The uploaded bulk transfer document.
///
/// # JSON Example
///
/// ```json
/// {
///   "organization_name": "ACME Corp",
///   "organization_bic": "OIVUSCLQXXX",
///   "organization_iban": "FR10474608000002006107XXXXX",
///   "credit_transfers": [
///     {
///       "amount": "14.5",
///       "counterparty_name": "Bip Bip",
///       "counterparty_bic": "CRLYFRPPTOU",
///       "counterparty_iban": "EE383680981021245685",
///       "description": "Wonderland/4410"
///     }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct BulkTransferFile {
    pub organization_name: String,
    pub organization_bic: String,
    pub organization_iban: String,
    pub credit_transfers: Vec<CreditTransfer>,
}

/// One entry of `credit_transfers`, with the amount still a decimal string.
#[derive(Debug, Deserialize)]
pub struct CreditTransfer {
    pub amount: String,
    pub counterparty_name: String,
    pub counterparty_bic: String,
    pub counterparty_iban: String,
    pub description: String,
}

/// An amount in the uploaded document that failed to parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid amount for transfer to {counterparty}: {source}")]
pub struct InvalidAmount {
    pub counterparty: String,
    #[source]
    pub source: ParseAmountError,
}

impl TryFrom<BulkTransferFile> for BulkTransferRequest {
    type Error = InvalidAmount;

    /// Convert the document, parsing every decimal amount into cents.
    fn try_from(file: BulkTransferFile) -> Result<Self, Self::Error> {
        let transfers = file
            .credit_transfers
            .into_iter()
            .map(|ct| {
                let amount_cents = parse_amount(&ct.amount).map_err(|source| InvalidAmount {
                    counterparty: ct.counterparty_name.clone(),
                    source,
                })?;
                Ok(TransferIntent {
                    amount_cents,
                    counterparty_name: ct.counterparty_name,
                    counterparty_iban: ct.counterparty_iban,
                    counterparty_bic: ct.counterparty_bic,
                    description: ct.description,
                })
            })
            .collect::<Result<Vec<_>, InvalidAmount>>()?;

        Ok(BulkTransferRequest {
            organization_name: file.organization_name,
            organization_bic: file.organization_bic,
            organization_iban: file.organization_iban,
            transfers,
        })
    }
}
