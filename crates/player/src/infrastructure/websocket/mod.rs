//! WebSocket push channel.

mod client;

pub use client::TungstenitePushTransport;
