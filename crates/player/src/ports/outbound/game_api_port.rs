//! Game API Port - HTTP boundary to the game server
//!
//! Typed and object-safe so the session can hold it behind `Arc<dyn ...>`.
//! Adapters map transport failures into [`ApiError`]; application-level
//! rejections travel inside the returned body's status envelope.

use async_trait::async_trait;

use boardsync_protocol::{
    InfoQuery, InfoResponse, MoveRequest, MoveResponse, VersionQuery, VersionResponse,
};

/// Transport-level failures talking to the game server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request could not be sent or no response arrived.
    #[error("Request failed: {0}")]
    Transport(String),

    /// Server answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn transport(message: impl ToString) -> Self {
        Self::Transport(message.to_string())
    }

    pub fn decode(message: impl ToString) -> Self {
        Self::Decode(message.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameApiPort: Send + Sync {
    async fn fetch_info(&self, query: InfoQuery) -> Result<InfoResponse, ApiError>;

    async fn fetch_version(&self, query: VersionQuery) -> Result<VersionResponse, ApiError>;

    async fn submit_move(&self, request: MoveRequest) -> Result<MoveResponse, ApiError>;
}
