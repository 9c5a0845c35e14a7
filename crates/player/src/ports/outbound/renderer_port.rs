//! Renderer port - the rendering collaborator fed one bundle at a time.

use crate::application::{RenderFrame, SessionInfo, TimerFrame, UserFacingError};

/// Receives deliveries from the session loop.
///
/// Calls happen on the session task; implementations should hand work off
/// rather than block. Transition starts and ends are reported back through
/// the [`AnimationHooks`](crate::application::AnimationHooks) in each frame.
#[cfg_attr(test, mockall::automock)]
pub trait RendererPort: Send + Sync {
    /// Show a new state.
    fn render(&self, frame: RenderFrame);

    /// Refresh timer views only; nothing else in the state changed.
    fn update_timers(&self, frame: TimerFrame);

    /// Every transition started by the last render has finished.
    fn all_done(&self);

    /// Show an error dialog.
    fn show_error(&self, error: &UserFacingError);

    /// Session-level facts from the info endpoint.
    fn session_info(&self, info: &SessionInfo);
}
