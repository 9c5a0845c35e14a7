//! Service layer error types
//!
//! This module defines errors that can occur while talking to the game
//! server, separating transport failures from application-level rejections,
//! and the message shape shown to the user.

use serde::Serialize;

use boardsync_protocol::{InfoResponse, MoveResponse, Rejection, StatusEnvelope, VersionResponse};

use crate::ports::outbound::ApiError;

/// Errors that can occur in service operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// Request failed to send, or the response could not be read
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Server answered with a non-success status
    #[error("Rejected by server: {0}")]
    Rejected(Rejection),

    /// Response lacked a field the client cannot work without
    #[error("Response is missing {0}")]
    MissingField(&'static str),
}

impl ServiceError {
    /// Transient failures are retried silently; everything else is shown.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Api(_))
    }
}

/// Error text for an error dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub friendly_message: String,
    pub technical_detail: String,
}

impl UserFacingError {
    pub fn new(friendly_message: impl Into<String>, technical_detail: impl Into<String>) -> Self {
        Self {
            friendly_message: friendly_message.into(),
            technical_detail: technical_detail.into(),
        }
    }
}

impl std::fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.friendly_message)
    }
}

impl From<Rejection> for UserFacingError {
    fn from(rejection: Rejection) -> Self {
        Self::new(rejection.friendly, rejection.technical)
    }
}

impl From<&ServiceError> for UserFacingError {
    fn from(error: &ServiceError) -> Self {
        match error {
            ServiceError::Rejected(rejection) => rejection.clone().into(),
            ServiceError::Api(api) => Self::new(
                "Could not reach the game server. Check your connection and try again.",
                api.to_string(),
            ),
            ServiceError::MissingField(_) => Self::new(
                "The game server sent an incomplete response.",
                error.to_string(),
            ),
        }
    }
}

/// Helper trait for turning a status-carrying response into a result
pub trait CheckStatus: Sized {
    fn envelope(&self) -> &StatusEnvelope;

    /// Pass the response through if the server reported success.
    fn accepted(self) -> Result<Self, ServiceError> {
        match self.envelope().rejection() {
            Some(rejection) => Err(ServiceError::Rejected(rejection)),
            None => Ok(self),
        }
    }
}

impl CheckStatus for InfoResponse {
    fn envelope(&self) -> &StatusEnvelope {
        &self.envelope
    }
}

impl CheckStatus for VersionResponse {
    fn envelope(&self) -> &StatusEnvelope {
        &self.envelope
    }
}

impl CheckStatus for MoveResponse {
    fn envelope(&self) -> &StatusEnvelope {
        &self.envelope
    }
}
