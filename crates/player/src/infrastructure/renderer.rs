//! Headless renderer that reports deliveries through tracing.

use crate::application::{RenderFrame, SessionInfo, TimerFrame, UserFacingError};
use crate::ports::outbound::RendererPort;

/// Logs every delivery instead of drawing it.
///
/// It never starts a transition, so each delivery completes on the settle
/// check that follows it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRenderer;

impl RendererPort for TracingRenderer {
    fn render(&self, frame: RenderFrame) {
        let state = serde_json::to_string(&frame.state).unwrap_or_default();
        tracing::info!(
            version = frame.game.version,
            current_player = frame.game.current_player_index,
            finished = frame.game.finished,
            viewing_as_player = frame.viewing_as_player,
            forms = frame.forms.len(),
            "Rendered state"
        );
        tracing::trace!(%state, "Expanded state");
        frame.hooks.ready_for_next();
    }

    fn update_timers(&self, frame: TimerFrame) {
        for (id, timer) in &frame.timers {
            tracing::trace!(timer = %id, time_left = timer.time_left, "Timer tick");
        }
    }

    fn all_done(&self) {
        tracing::debug!("All transitions finished");
    }

    fn show_error(&self, error: &UserFacingError) {
        tracing::error!(
            detail = %error.technical_detail,
            "{}",
            error.friendly_message
        );
    }

    fn session_info(&self, info: &SessionInfo) {
        tracing::info!(
            players = info.players.len(),
            viewing_as_player = info.viewing_as_player,
            game_open = info.game_open,
            is_owner = info.is_owner,
            "Session info"
        );
    }
}
