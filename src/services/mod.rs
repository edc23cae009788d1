//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and retries.

pub mod backoff;
pub mod transfer_service;
