//! Push channel port - the socket announcing new state versions.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Connection error: {0}")]
    Stream(String),
}

/// Text frames from an open push channel. The stream ending means the
/// connection closed; dropping it closes the connection.
pub type PushFrames = BoxStream<'static, Result<String, TransportError>>;

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, url: &str) -> Result<PushFrames, TransportError>;
}
