//! Bundles: one animatable state transition, ready to hand to the renderer.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use boardsync_protocol::{Chest, GameSnapshot, MoveForm, RawBundle, TimerInfo, TimerInfos};

use super::expansion::{expand_state, ExpandedState, TimerMode};
use super::forms::{resolve_forms, ResolvedForm};

/// Game-level facts that travel with each state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameSummary {
    pub name: String,
    pub id: String,
    pub version: i64,
    pub current_player_index: i64,
    pub finished: bool,
    pub winners: Vec<i64>,
}

impl From<&GameSnapshot> for GameSummary {
    fn from(game: &GameSnapshot) -> Self {
        Self {
            name: game.name.clone(),
            id: game.id.clone(),
            version: game.version,
            current_player_index: game.current_player_index,
            finished: game.finished,
            winners: game.winners.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub game: GameSummary,
    /// Expanded without live timers; timers are overlaid at delivery.
    pub state: ExpandedState,
    /// Timer values as of `received_at`.
    pub timers: TimerInfos,
    pub received_at: Instant,
    pub forms: Vec<ResolvedForm>,
    pub viewing_as_player: i64,
    /// Wait before showing this state.
    pub delay: Duration,
}

impl Bundle {
    /// Bundle for one entry of a version response.
    pub fn from_raw(raw: &RawBundle, chest: &Chest, game_name: &str) -> Self {
        Self::build(
            &raw.game,
            &raw.forms,
            raw.viewing_as_player,
            Duration::from_millis(raw.delay),
            chest,
            game_name,
        )
    }

    /// Bundle for the state installed by the info endpoint. Shown without
    /// delay.
    pub fn from_info(
        game: &GameSnapshot,
        forms: &[MoveForm],
        viewing_as_player: i64,
        chest: &Chest,
        game_name: &str,
    ) -> Self {
        Self::build(game, forms, viewing_as_player, Duration::ZERO, chest, game_name)
    }

    fn build(
        game: &GameSnapshot,
        forms: &[MoveForm],
        viewing_as_player: i64,
        delay: Duration,
        chest: &Chest,
        game_name: &str,
    ) -> Self {
        let state = expand_state(&game.current_state, chest, game_name, TimerMode::Skip);
        Self {
            game: GameSummary::from(game),
            state,
            timers: game
                .active_timers
                .iter()
                .map(|(id, info)| (id.clone(), info.normalized()))
                .collect(),
            received_at: Instant::now(),
            forms: resolve_forms(forms, chest),
            viewing_as_player,
            delay,
        }
    }

    pub fn version(&self) -> i64 {
        self.game.version
    }

    /// Timer values counted down by the time spent since the bundle arrived,
    /// clamped at zero.
    pub fn timers_at(&self, now: Instant) -> TimerInfos {
        let waited = now.saturating_duration_since(self.received_at).as_millis();
        let waited = i64::try_from(waited).unwrap_or(i64::MAX);
        self.timers
            .iter()
            .map(|(id, timer)| {
                let aged = TimerInfo {
                    time_left: timer.time_left.saturating_sub(waited).max(0),
                    ..*timer
                };
                (id.clone(), aged)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::fixtures::{chest, game_snapshot, raw_bundle, GAME_NAME};

    #[test]
    fn raw_bundle_carries_delay_and_resolved_forms() {
        let bundle = Bundle::from_raw(&raw_bundle(4, 750), &chest(), GAME_NAME);

        assert_eq!(bundle.version(), 4);
        assert_eq!(bundle.delay, Duration::from_millis(750));
        assert_eq!(bundle.forms.len(), 1);
        assert!(bundle.forms[0].fields[1].enum_values.is_some());
        assert_eq!(bundle.state.version, 4);
    }

    #[test]
    fn info_bundle_has_no_delay_and_zeroed_timer_views() {
        let bundle = Bundle::from_info(&game_snapshot(3), &[], 1, &chest(), GAME_NAME);

        assert_eq!(bundle.delay, Duration::ZERO);
        assert_eq!(bundle.viewing_as_player, 1);
        assert!(bundle.timers["turn"].is_running());
        assert_eq!(bundle.timers["turn"].original_time_left, 3_000);
        assert_eq!(bundle.state.game.timer("TurnTimer").unwrap().time_left, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_bundle_timers_keep_counting_down() {
        let bundle = Bundle::from_raw(&raw_bundle(4, 0), &chest(), GAME_NAME);

        tokio::time::advance(Duration::from_millis(1_200)).await;
        let aged = bundle.timers_at(Instant::now());
        assert_eq!(aged["turn"].time_left, 1_800);
        assert_eq!(aged["turn"].original_time_left, 3_000);
        assert_eq!(bundle.timers["turn"].time_left, 3_000);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(bundle.timers_at(Instant::now())["turn"].time_left, 0);
    }
}
