//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that infrastructure adapters must implement,
//! allowing the session to talk to the game server, the push channel, the
//! clock and the renderer without depending on concrete implementations.

pub mod game_api_port;
pub mod push_channel_port;
pub mod renderer_port;
pub mod scheduler_port;

pub use game_api_port::{ApiError, GameApiPort};
pub use push_channel_port::{PushFrames, PushTransport, TransportError};
pub use renderer_port::RendererPort;
pub use scheduler_port::SchedulerPort;

#[cfg(test)]
pub use game_api_port::MockGameApiPort;
#[cfg(test)]
pub use renderer_port::MockRendererPort;
