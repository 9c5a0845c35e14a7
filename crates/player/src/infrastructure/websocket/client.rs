//! Push channel over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::ports::outbound::{PushFrames, PushTransport, TransportError};

/// Opens the game's push socket and yields its text frames.
///
/// Control frames are handled by tungstenite and never reach the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungstenitePushTransport;

#[async_trait]
impl PushTransport for TungstenitePushTransport {
    async fn open(&self, url: &str) -> Result<PushFrames, TransportError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::info!("Connected to push channel at {}", url);

        let frames = ws_stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Server closed push channel");
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Stream(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}
