//! Bulk transfer HTTP handlers.
//!
//! This module implements the transfer endpoints:
//! - POST /api/v1/transfers - Upload a bulk transfer file (multipart, field `file`)
//! - POST /api/v1/transfers/json - Submit the same document as a JSON body

use axum::{
    Json,
    body::Bytes,
    extract::{
        State,
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    error::AppError,
    models::transfer::{BulkTransferFile, BulkTransferRequest},
    routes::AppState,
};

/// Name of the multipart field carrying the JSON document.
const UPLOAD_FIELD: &str = "file";

/// Response body of a successful bulk transfer.
#[derive(Debug, Serialize)]
pub struct BulkTransferResponse {
    pub message: String,
}

/// Process an uploaded bulk transfer file.
///
/// # Request
///
/// `multipart/form-data` with a `file` field containing the JSON document
/// described by [`BulkTransferFile`].
///
/// # Response
///
/// - **Success (201 Created)**: `{"message": "Bulk transfer processed successfully"}`
/// - **Error (400)**: Missing file, malformed JSON, invalid amount or field
/// - **Error (404)**: No account with the organization IBAN
/// - **Error (422)**: Balance does not cover the transfers
/// - **Error (500)**: Storage failure or retries exhausted
pub async fn upload_bulk_transfer(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<BulkTransferResponse>), AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!(error = %rejection, "Failed to retrieve file from request");
        AppError::InvalidRequest("Error retrieving the file".to_string())
    })?;

    let content = read_upload(&mut multipart).await?;

    let file: BulkTransferFile = serde_json::from_slice(&content).map_err(|e| {
        warn!(error = %e, "Failed to parse JSON content");
        AppError::InvalidRequest("Error parsing JSON content".to_string())
    })?;

    process_bulk_transfer(&state, file).await
}

/// Process a bulk transfer document sent as the request body.
pub async fn create_bulk_transfer(
    State(state): State<AppState>,
    payload: Result<Json<BulkTransferFile>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkTransferResponse>), AppError> {
    let Json(file) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Failed to parse JSON body");
        AppError::InvalidRequest("Error parsing JSON content".to_string())
    })?;

    process_bulk_transfer(&state, file).await
}

/// Find the upload field and return its bytes.
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Failed to read multipart body");
        AppError::InvalidRequest("Error retrieving the file".to_string())
    })? {
        if field.name() == Some(UPLOAD_FIELD) {
            return field.bytes().await.map_err(|e| {
                warn!(error = %e, "Failed to read file content");
                AppError::InvalidRequest("Error reading file content".to_string())
            });
        }
    }

    Err(AppError::InvalidRequest(
        "Error retrieving the file".to_string(),
    ))
}

async fn process_bulk_transfer(
    state: &AppState,
    file: BulkTransferFile,
) -> Result<(StatusCode, Json<BulkTransferResponse>), AppError> {
    let organization = file.organization_name.clone();
    let transfer_count = file.credit_transfers.len();
    info!(%organization, transfer_count, "Processing bulk transfer request");

    let request = BulkTransferRequest::try_from(file).inspect_err(|e| {
        warn!(%organization, error = %e, "Invalid amount for transfer");
    })?;

    // Shutdown cancels every in-flight request's retry wait
    let cancel = state.shutdown.child_token();

    state
        .transfers
        .bulk_transfer(&cancel, request)
        .await
        .inspect_err(|e| match e {
            AppError::InsufficientFunds { .. } => {
                warn!(%organization, error = %e, "Insufficient funds for bulk transfer")
            }
            AppError::Storage { .. } | AppError::RetryExhausted { .. } => {
                error!(%organization, error = %e, "Failed to process bulk transfer")
            }
            _ => warn!(%organization, error = %e, "Bulk transfer rejected"),
        })?;

    info!(%organization, transfer_count, "Bulk transfer processed successfully");
    Ok((
        StatusCode::CREATED,
        Json(BulkTransferResponse {
            message: "Bulk transfer processed successfully".to_string(),
        }),
    ))
}
