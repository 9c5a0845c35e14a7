//! Application layer: expansion, delivery sequencing and the session loop.

pub mod animation_gate;
pub mod bundle;
pub mod bundle_queue;
pub mod connection_manager;
pub mod error;
pub mod expansion;
pub mod forms;
pub mod session;
pub mod version_reconciler;

pub use animation_gate::{AnimationGate, ElementRef, GateStatus};
pub use bundle::{Bundle, GameSummary};
pub use bundle_queue::{BundleQueue, DeliveryPhase, DeliveryTicket, DeliveryTrigger};
pub use connection_manager::{ConnectionManager, ConnectionState, ConnectionStateObserver};
pub use error::{CheckStatus, ServiceError, UserFacingError};
pub use expansion::{
    expand_stack, expand_state, overlay_timers, ExpandedComponent, ExpandedObject, ExpandedStack,
    ExpandedState, ExpandedValue, TimerMode, TimerView,
};
pub use forms::{resolve_forms, ResolvedField, ResolvedForm};
pub use session::{
    AnimationHooks, MoveProposal, RenderFrame, SessionDeps, SessionHandle, SessionInfo,
    SessionSettings, SessionSnapshot, TimerFrame,
};
pub use version_reconciler::{VersionReconciler, VersionState, ViewerParams};
