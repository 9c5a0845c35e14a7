//! Version reconciler: decides when to fetch bundles and what range to ask
//! for, keeping the client watermark and the pushed target version apart.
//!
//! Like the other pipeline state machines this is sans-IO. The session calls
//! [`VersionReconciler::poll`] after every input change; a returned
//! [`VersionFetch`] is the single in-flight request until its outcome is
//! reported back with the same generation.

use serde::Serialize;

use boardsync_protocol::VersionQuery;

use super::bundle::Bundle;

/// Version bookkeeping. `-1` means "none yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionState {
    /// Last version handed to the renderer.
    pub current: i64,
    /// Highest version the server has announced.
    pub target: i64,
    /// Watermark: highest version fetched (queued or shown).
    pub last_fetched: i64,
}

impl Default for VersionState {
    fn default() -> Self {
        Self {
            current: -1,
            target: -1,
            last_fetched: -1,
        }
    }
}

/// Whose perspective the client is viewing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ViewerParams {
    pub player: i64,
    pub admin: bool,
    pub auto_current_player: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchGeneration(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionFetch {
    pub generation: FetchGeneration,
    pub query: VersionQuery,
}

#[derive(Debug, PartialEq)]
pub enum FetchResult {
    /// Response belongs to a superseded viewer or session; discard it.
    Stale,
    /// Bundles above the watermark, in order, ready to enqueue.
    Accepted(Vec<Bundle>),
    /// Nothing new arrived although the target is still ahead; arm a retry.
    Stalled,
}

#[derive(Debug, Default)]
pub struct VersionReconciler {
    state: VersionState,
    viewer: ViewerParams,
    active: bool,
    info_installed: bool,
    in_flight: bool,
    retry_pending: bool,
    generation: u64,
}

impl VersionReconciler {
    pub fn new(viewer: ViewerParams) -> Self {
        Self {
            viewer,
            ..Self::default()
        }
    }

    pub fn state(&self) -> VersionState {
        self.state
    }

    pub fn viewer(&self) -> ViewerParams {
        self.viewer
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight
    }

    pub fn info_installed(&self) -> bool {
        self.info_installed
    }

    pub fn generation(&self) -> FetchGeneration {
        FetchGeneration(self.generation)
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if !active {
            self.info_installed = false;
            self.invalidate();
        }
    }

    /// Record the state delivered by the info endpoint.
    pub fn install_info(&mut self, version: i64) {
        self.info_installed = true;
        self.state.last_fetched = version;
        self.on_version_push(version);
        tracing::debug!(version, target = self.state.target, "Info installed");
    }

    /// A version number announced over the push channel (or by an info
    /// refresh). The target only ever moves forward.
    pub fn on_version_push(&mut self, version: i64) -> bool {
        if version > self.state.target {
            self.state.target = version;
            true
        } else {
            false
        }
    }

    /// Switch perspective. Returns false when nothing changed.
    ///
    /// The caller must drop queued bundles and reinstall info; any in-flight
    /// fetch is orphaned.
    pub fn set_viewer(&mut self, player: i64, admin: bool) -> bool {
        if self.viewer.player == player && self.viewer.admin == admin {
            return false;
        }
        self.viewer.player = player;
        self.viewer.admin = admin;
        self.info_installed = false;
        self.invalidate();
        true
    }

    pub fn set_auto_current_player(&mut self, enabled: bool) -> bool {
        let changed = self.viewer.auto_current_player != enabled;
        self.viewer.auto_current_player = enabled;
        changed
    }

    /// The fetch to issue now, if any.
    pub fn poll(&mut self) -> Option<VersionFetch> {
        if !self.active
            || self.state.target < 0
            || !self.info_installed
            || self.in_flight
            || self.retry_pending
            || self.state.last_fetched >= self.state.target
        {
            return None;
        }

        self.in_flight = true;
        let query = VersionQuery {
            target: self.state.target,
            player: self.viewer.player,
            admin: self.viewer.admin,
            auto_current_player: self.viewer.auto_current_player,
            from: self.state.last_fetched,
        };
        tracing::debug!(
            target_version = query.target,
            from = query.from,
            "Fetching version bundles"
        );
        Some(VersionFetch {
            generation: self.generation(),
            query,
        })
    }

    pub fn fetch_succeeded(
        &mut self,
        generation: FetchGeneration,
        bundles: Vec<Bundle>,
    ) -> FetchResult {
        if generation != self.generation() {
            return FetchResult::Stale;
        }
        self.in_flight = false;

        let received = bundles.len();
        let mut accepted = Vec::with_capacity(received);
        for bundle in bundles {
            if bundle.version() <= self.state.last_fetched {
                tracing::debug!(
                    version = bundle.version(),
                    watermark = self.state.last_fetched,
                    "Dropping bundle at or below watermark"
                );
                continue;
            }
            self.state.last_fetched = bundle.version();
            accepted.push(bundle);
        }

        if accepted.is_empty() && self.state.last_fetched < self.state.target {
            tracing::warn!(
                received,
                watermark = self.state.last_fetched,
                target_version = self.state.target,
                "Version response did not advance the watermark"
            );
            self.retry_pending = true;
            return FetchResult::Stalled;
        }
        FetchResult::Accepted(accepted)
    }

    /// Returns true when the caller should arm a retry timer.
    pub fn fetch_failed(&mut self, generation: FetchGeneration) -> bool {
        if generation != self.generation() {
            return false;
        }
        self.in_flight = false;
        self.retry_pending = true;
        true
    }

    pub fn retry_elapsed(&mut self, generation: FetchGeneration) {
        if generation == self.generation() {
            self.retry_pending = false;
        }
    }

    pub fn mark_delivered(&mut self, version: i64) {
        self.state.current = version;
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.in_flight = false;
        self.retry_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::fixtures::{chest, raw_bundle, GAME_NAME};

    fn bundles(versions: &[i64]) -> Vec<Bundle> {
        versions
            .iter()
            .map(|version| Bundle::from_raw(&raw_bundle(*version, 0), &chest(), GAME_NAME))
            .collect()
    }

    fn versions(result: FetchResult) -> Vec<i64> {
        match result {
            FetchResult::Accepted(bundles) => bundles.iter().map(Bundle::version).collect(),
            other => panic!("expected accepted bundles, got {other:?}"),
        }
    }

    fn ready(info_version: i64) -> VersionReconciler {
        let mut reconciler = VersionReconciler::new(ViewerParams::default());
        reconciler.set_active(true);
        reconciler.install_info(info_version);
        reconciler
    }

    #[test]
    fn push_after_info_fetches_the_gap() {
        let mut reconciler = ready(3);
        assert!(reconciler.poll().is_none());

        assert!(reconciler.on_version_push(5));
        let fetch = reconciler.poll().unwrap();
        assert_eq!(fetch.query.path(), "version/5?player=0&admin=0&current=0&from=3");

        assert!(reconciler.poll().is_none(), "one fetch in flight at a time");

        let accepted = reconciler.fetch_succeeded(fetch.generation, bundles(&[4, 5]));
        assert_eq!(versions(accepted), vec![4, 5]);
        assert_eq!(reconciler.state().last_fetched, 5);
        assert!(reconciler.poll().is_none());
    }

    #[test]
    fn fetch_is_suppressed_until_prerequisites_hold() {
        let mut reconciler = VersionReconciler::new(ViewerParams::default());
        reconciler.on_version_push(2);
        assert!(reconciler.poll().is_none(), "inactive");

        reconciler.set_active(true);
        assert!(reconciler.poll().is_none(), "no info yet");

        reconciler.install_info(2);
        assert!(reconciler.poll().is_none(), "info already at target");

        reconciler.on_version_push(3);
        assert!(reconciler.poll().is_some());
    }

    #[test]
    fn installed_info_version_raises_the_target() {
        let mut reconciler = ready(3);
        assert_eq!(reconciler.state().target, 3);
        assert!(reconciler.poll().is_none());

        assert!(!reconciler.on_version_push(2));
        assert_eq!(reconciler.state().target, 3);
    }

    #[test]
    fn negative_target_never_fetches() {
        let mut reconciler = ready(-1);
        assert!(reconciler.poll().is_none());
    }

    #[test]
    fn target_is_monotonic() {
        let mut reconciler = ready(0);
        assert!(reconciler.on_version_push(7));
        assert!(!reconciler.on_version_push(4));
        assert!(!reconciler.on_version_push(7));
        assert_eq!(reconciler.state().target, 7);
    }

    #[test]
    fn bundles_at_or_below_watermark_are_dropped() {
        let mut reconciler = ready(3);
        reconciler.on_version_push(5);
        let fetch = reconciler.poll().unwrap();

        let accepted = reconciler.fetch_succeeded(fetch.generation, bundles(&[2, 3, 4, 4, 5]));
        assert_eq!(versions(accepted), vec![4, 5]);
    }

    #[test]
    fn failed_fetch_waits_for_retry() {
        let mut reconciler = ready(1);
        reconciler.on_version_push(2);
        let fetch = reconciler.poll().unwrap();

        assert!(reconciler.fetch_failed(fetch.generation));
        assert!(!reconciler.is_fetching());
        assert!(reconciler.poll().is_none());

        reconciler.retry_elapsed(fetch.generation);
        let retry = reconciler.poll().unwrap();
        assert_eq!(retry.query.from, 1);
    }

    #[test]
    fn empty_response_stalls_instead_of_spinning() {
        let mut reconciler = ready(1);
        reconciler.on_version_push(2);
        let fetch = reconciler.poll().unwrap();

        assert_eq!(
            reconciler.fetch_succeeded(fetch.generation, Vec::new()),
            FetchResult::Stalled
        );
        assert!(reconciler.poll().is_none());
        reconciler.retry_elapsed(fetch.generation);
        assert!(reconciler.poll().is_some());
    }

    #[test]
    fn viewer_change_orphans_in_flight_fetch() {
        let mut reconciler = ready(3);
        reconciler.on_version_push(4);
        let fetch = reconciler.poll().unwrap();

        assert!(reconciler.set_viewer(1, false));
        assert!(!reconciler.info_installed());
        assert_eq!(
            reconciler.fetch_succeeded(fetch.generation, bundles(&[4])),
            FetchResult::Stale
        );
        assert!(!reconciler.fetch_failed(fetch.generation));

        reconciler.install_info(3);
        let refetch = reconciler.poll().unwrap();
        assert_eq!(refetch.query.player, 1);
        assert_ne!(refetch.generation, fetch.generation);
    }

    #[test]
    fn setting_the_same_viewer_is_a_no_op() {
        let mut reconciler = ready(0);
        assert!(!reconciler.set_viewer(0, false));
        assert!(reconciler.info_installed());
    }

    #[test]
    fn auto_current_player_is_sent_with_the_query() {
        let mut reconciler = ready(0);
        assert!(reconciler.set_auto_current_player(true));
        assert!(!reconciler.set_auto_current_player(true));
        reconciler.on_version_push(1);
        assert!(reconciler.poll().unwrap().query.auto_current_player);
    }

    #[test]
    fn deactivation_clears_info_and_in_flight_state() {
        let mut reconciler = ready(0);
        reconciler.on_version_push(1);
        let fetch = reconciler.poll().unwrap();

        reconciler.set_active(false);
        assert!(!reconciler.is_fetching());
        assert!(!reconciler.info_installed());
        assert_eq!(
            reconciler.fetch_succeeded(fetch.generation, bundles(&[1])),
            FetchResult::Stale
        );
    }
}
