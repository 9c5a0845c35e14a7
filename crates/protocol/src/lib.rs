//! Boardsync Protocol - Wire types shared with the game server
//!
//! This crate contains the shapes exchanged with the board-game server:
//! - Compact state snapshots (stacks, timers, computed properties)
//! - The static component chest and move forms
//! - Info, version and move response bodies
//! - Endpoint paths for info, version and move requests
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde and serde_json
//! 2. **No business logic** - Pure data types and serialization
//! 3. **PascalCase on the wire** - matches the server's JSON

pub mod chest;
pub mod forms;
pub mod requests;
pub mod responses;
pub mod state;

pub use chest::Chest;
pub use forms::{MoveField, MoveForm};
pub use requests::{InfoQuery, MoveRequest, VersionQuery};
pub use responses::{
    InfoResponse, MoveResponse, PlayerSummary, RawBundle, Rejection, ResponseStatus,
    StatusEnvelope, VersionResponse,
};
pub use state::{
    ComputedState, GameSnapshot, PropertyMap, RawState, StackRef, StateValue, TimerInfo,
    TimerInfos, TimerRef, EMPTY_SLOT, GENERIC_SLOT,
};
