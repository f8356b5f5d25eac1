/**
 * Error Conversion
 *
 * This module provides conversion implementations for hub errors,
 * allowing them to be returned directly from Axum handlers.
 *
 * # Response Format
 *
 * Error responses are returned as JSON with the following structure:
 * ```json
 * {
 *   "error": "Error message",
 *   "code": "no_such_request",
 *   "retryable": false,
 *   "status": 404
 * }
 * ```
 */

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use crate::backend::error::types::HubError;

impl IntoResponse for HubError {
    /// Convert a hub error into an HTTP response
    ///
    /// Server-side failures are logged here so handlers can use `?` freely.
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
        }

        let body = serde_json::json!({
            "error": self.message(),
            "code": self.code(),
            "retryable": self.is_retryable(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
