//! Data models representing database entities and request documents.

/// Bank account model and validation errors
pub mod account;
/// Decimal amount parsing
pub mod amount;
/// Transfer models and bulk request types
pub mod transfer;
