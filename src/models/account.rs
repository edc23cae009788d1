//! Bank account data model.
//!
//! This module defines:
//! - `BankAccount`: Database entity for the organization account being debited
//! - `AccountResponse`: Response body returned to clients
//! - `ValidationError`: Structured reasons an entity or request is rejected

use serde::Serialize;

use crate::models::amount::format_amount;

/// Represents a bank account record from the database.
///
/// # Database Table
///
/// Maps to the `bank_accounts` table. Each account:
/// - Is identified by a storage-assigned `BIGSERIAL` id
/// - Is located by its unique IBAN
/// - Has a balance stored in cents (to avoid floating-point errors)
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct BankAccount {
    /// Unique identifier assigned by the database
    pub id: i64,

    /// Name of the organization owning this account
    pub organization_name: String,

    /// Current balance in cents
    ///
    /// Must be >= 0 (enforced by database CHECK constraint).
    pub balance_cents: i64,

    /// International Bank Account Number, unique across accounts
    pub iban: String,

    /// Bank Identifier Code
    pub bic: String,
}

impl BankAccount {
    /// Check the required fields and the balance invariant.
    ///
    /// # Errors
    ///
    /// - `MissingField`: organization name, IBAN or BIC is empty
    /// - `NegativeBalance`: balance is below zero
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("organization_name", &self.organization_name)?;
        require("iban", &self.iban)?;
        require("bic", &self.bic)?;
        if self.balance_cents < 0 {
            return Err(ValidationError::NegativeBalance(self.balance_cents));
        }
        Ok(())
    }

    /// Return a copy of this account with `amount_cents` removed from the balance.
    ///
    /// # Errors
    ///
    /// - `NegativeBalance`: the debit would take the balance below zero
    pub fn debited(&self, amount_cents: i64) -> Result<BankAccount, ValidationError> {
        let balance_cents = self
            .balance_cents
            .checked_sub(amount_cents)
            .ok_or(ValidationError::AmountOverflow)?;
        if balance_cents < 0 {
            return Err(ValidationError::NegativeBalance(balance_cents));
        }
        Ok(BankAccount {
            balance_cents,
            ..self.clone()
        })
    }
}

/// Response body for the account endpoint.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 1,
///   "organization_name": "ACME Corp",
///   "iban": "FR10474608000002006107XXXXX",
///   "bic": "OIVUSCLQXXX",
///   "balance_cents": 1000000,
///   "balance": "10000.00"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub organization_name: String,
    pub iban: String,
    pub bic: String,
    pub balance_cents: i64,

    /// Balance rendered as a decimal string
    pub balance: String,
}

impl From<BankAccount> for AccountResponse {
    fn from(account: BankAccount) -> Self {
        Self {
            id: account.id,
            balance: format_amount(account.balance_cents),
            organization_name: account.organization_name,
            iban: account.iban,
            bic: account.bic,
            balance_cents: account.balance_cents,
        }
    }
}

/// Reasons an entity or request fails validation.
///
/// These are client-input faults and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("transfer amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("total transfer amount exceeds maximum allowed value")]
    AmountOverflow,

    #[error("balance cannot be negative, got {0}")]
    NegativeBalance(i64),

    #[error("bulk transfer must contain at least one transfer")]
    EmptyBatch,
}

/// Reject an empty (or whitespace-only) required string field.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}
