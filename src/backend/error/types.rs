/**
 * Hub Error Types
 *
 * This module defines the error taxonomy of the hub. Every variant maps to
 * an HTTP status for REST callers and to a stable machine code plus a
 * retryable flag for WebSocket clients.
 *
 * # Error Categories
 *
 * ## Handshake
 *
 * - `Auth` - bad or expired credential; the connection is refused
 *
 * ## Request validation
 *
 * - `InvalidRoom`, `InvalidSession`, `MalformedFrame`, `NotInRoom`
 *   reject a single request, the connection stays alive
 *
 * ## State transitions
 *
 * - `SessionNotActive` - the broadcast ended, stop joining
 * - `NoSuchRequest`, `SelfRequest` - relationship edge does not allow it
 *
 * ## Store
 *
 * - `StoreTimeout` and transient `Store` failures are retryable; no partial
 *   in-memory mutation survives them
 */

use thiserror::Error;
use axum::http::StatusCode;

use crate::backend::store::StoreError;
use crate::shared::identity::{ConnectionId, UserId};

/// Hub error types
#[derive(Debug, Error)]
pub enum HubError {
    /// Bad or expired credential at handshake
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Malformed room name or a room the caller may not join
    #[error("Invalid room: {0}")]
    InvalidRoom(String),

    /// Malformed broadcast session identifier
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Room-scoped action on a room the connection has not joined
    #[error("Connection is not a member of {0}")]
    NotInRoom(String),

    /// Viewer join against a broadcast that is not live
    #[error("Broadcast session {0} is not active")]
    SessionNotActive(String),

    /// Relationship mutation on an edge that does not exist (any more)
    #[error("No pending request from {from} to {to}")]
    NoSuchRequest {
        /// Initiator of the missing request
        from: UserId,
        /// Recipient of the missing request
        to: UserId,
    },

    /// Relationship request addressed to the sender
    #[error("Cannot send a friend request to yourself")]
    SelfRequest,

    /// The durable store did not answer in time
    #[error("Store operation {0} timed out")]
    StoreTimeout(&'static str),

    /// Command for a connection the registry does not know
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// Client frame that could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Durable store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HubError {
    /// Create a new authentication error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a new invalid-room error
    pub fn invalid_room(message: impl Into<String>) -> Self {
        Self::InvalidRoom(message.into())
    }

    /// Create a new invalid-session error
    pub fn invalid_session(message: impl Into<String>) -> Self {
        Self::InvalidSession(message.into())
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `Auth` - 401 Unauthorized
    /// - `Forbidden` - 403 Forbidden
    /// - `NoSuchRequest`, `UnknownConnection` - 404 Not Found
    /// - `NotInRoom` - 409 Conflict
    /// - `SessionNotActive` - 410 Gone
    /// - `StoreTimeout`, transient `Store` - 503 Service Unavailable
    /// - remaining validation errors - 400 Bad Request
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidRoom(_)
            | Self::InvalidSession(_)
            | Self::SelfRequest
            | Self::MalformedFrame(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NoSuchRequest { .. } | Self::UnknownConnection(_) => StatusCode::NOT_FOUND,
            Self::NotInRoom(_) => StatusCode::CONFLICT,
            Self::SessionNotActive(_) => StatusCode::GONE,
            Self::StoreTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(err) if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code sent to WebSocket clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth_error",
            Self::InvalidRoom(_) => "invalid_room",
            Self::InvalidSession(_) => "invalid_session",
            Self::NotInRoom(_) => "not_in_room",
            Self::SessionNotActive(_) => "session_not_active",
            Self::NoSuchRequest { .. } => "no_such_request",
            Self::SelfRequest => "self_request",
            Self::StoreTimeout(_) => "store_timeout",
            Self::UnknownConnection(_) => "unknown_connection",
            Self::MalformedFrame(_) => "malformed_frame",
            Self::Forbidden(_) => "forbidden",
            Self::Store(_) => "store_error",
            Self::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the client may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreTimeout(_) => true,
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        self.to_string()
    }
}
