//! Boardsync Player - client-side state synchronisation for board games.
//!
//! Keeps a local view of a server-authoritative game in step with the
//! server and hands state to a renderer one transition at a time:
//!
//! - `ports`: traits for the game API, push channel, scheduler and renderer
//! - `application`: state expansion, delivery sequencing and the session loop
//! - `infrastructure`: reqwest, tungstenite and tokio adapters
//! - `config`: environment-driven client configuration

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod ports;

pub use application::{
    AnimationHooks, MoveProposal, RenderFrame, SessionDeps, SessionHandle, SessionInfo,
    SessionSettings, SessionSnapshot, TimerFrame, UserFacingError,
};
pub use config::{ClientConfig, ConfigError};
