//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (multipart upload, JSON body, URL params)
//! 2. Delegates to the transfer service or storage
//! 3. Returns HTTP response (JSON, status code)

/// Account lookup endpoint
pub mod accounts;
/// Service health endpoint
pub mod health;
/// Bulk transfer endpoints
pub mod transfers;
