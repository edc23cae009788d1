//! Account HTTP handlers.
//!
//! - GET /api/v1/accounts/{iban} - Get the current state of an organization account
//! - GET /api/v1/accounts/{iban}/transfers - List the transfers debited from it

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    error::AppError,
    models::{account::AccountResponse, transfer::Transfer},
    routes::AppState,
};

/// Get an account by IBAN.
///
/// # Response
///
/// - **Success (200 OK)**: Returns account details with the balance in cents and as a decimal string
/// - **Error (404)**: No account has this IBAN
pub async fn get_account(
    State(state): State<AppState>,
    Path(iban): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state
        .accounts
        .find_by_iban(&iban)
        .await
        .map_err(|e| AppError::storage("load bank account", e))?;

    Ok(Json(account.into()))
}

/// List the committed transfers of an account, oldest first.
pub async fn list_account_transfers(
    State(state): State<AppState>,
    Path(iban): Path<String>,
) -> Result<Json<Vec<Transfer>>, AppError> {
    let account = state
        .accounts
        .find_by_iban(&iban)
        .await
        .map_err(|e| AppError::storage("load bank account", e))?;

    let transfers = state
        .accounts
        .list_transfers(account.id)
        .await
        .map_err(|e| AppError::storage("list transfers", e))?;

    Ok(Json(transfers))
}
