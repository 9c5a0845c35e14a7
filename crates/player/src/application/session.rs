//! Game session: the single task that owns the sync pipeline.
//!
//! Every piece of mutable state (queue, gate, reconciler, connection) lives in
//! [`GameSession`] and is touched only from its event loop. HTTP calls,
//! timers and the socket reader run as spawned tasks whose only effect is to
//! send a [`SessionEvent`] back. Each of those tasks is held in a slot so
//! deactivation can abort it immediately; generations and tickets take care
//! of any event that was already queued.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use boardsync_protocol::{
    Chest, InfoQuery, InfoResponse, MoveRequest, MoveResponse, PlayerSummary, TimerInfo,
    TimerInfos, VersionResponse,
};

use crate::ports::outbound::{
    ApiError, GameApiPort, PushTransport, RendererPort, SchedulerPort, TransportError,
};

use super::animation_gate::{AnimationGate, ElementRef, GateStatus};
use super::bundle::{Bundle, GameSummary};
use super::bundle_queue::{BundleQueue, DeliveryPhase, DeliveryTicket, DeliveryTrigger};
use super::connection_manager::{
    ConnectionManager, ConnectionState, ConnectionStateObserver, SocketGeneration,
};
use super::error::{CheckStatus, ServiceError, UserFacingError};
use super::expansion::{overlay_timers, ExpandedState};
use super::forms::ResolvedForm;
use super::version_reconciler::{
    FetchGeneration, FetchResult, VersionFetch, VersionReconciler, VersionState, ViewerParams,
};

/// Session parameters. The game name is explicit; nothing is inferred from
/// the environment.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub game_name: String,
    pub socket_url: String,
    pub viewer: ViewerParams,
    pub reconnect_delay: Duration,
    pub fetch_retry_delay: Duration,
    pub timer_tick_interval: Duration,
}

impl SessionSettings {
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(250);
    pub const DEFAULT_FETCH_RETRY_DELAY: Duration = Duration::from_millis(1_000);
    pub const DEFAULT_TIMER_TICK_INTERVAL: Duration = Duration::from_millis(50);

    pub fn new(game_name: impl Into<String>, socket_url: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            socket_url: socket_url.into(),
            viewer: ViewerParams::default(),
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
            fetch_retry_delay: Self::DEFAULT_FETCH_RETRY_DELAY,
            timer_tick_interval: Self::DEFAULT_TIMER_TICK_INTERVAL,
        }
    }
}

/// Adapters the session runs against.
#[derive(Clone)]
pub struct SessionDeps {
    pub api: Arc<dyn GameApiPort>,
    pub push: Arc<dyn PushTransport>,
    pub scheduler: Arc<dyn SchedulerPort>,
    pub renderer: Arc<dyn RendererPort>,
}

/// A move the user wants to make, in the shape of one of the current forms.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveProposal {
    pub move_name: String,
    pub arguments: Map<String, Value>,
}

/// Session-level facts from the info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionInfo {
    pub players: Vec<PlayerSummary>,
    pub viewing_as_player: i64,
    pub has_empty_slots: bool,
    pub game_open: bool,
    pub game_visible: bool,
    pub is_owner: bool,
}

impl From<&InfoResponse> for SessionInfo {
    fn from(info: &InfoResponse) -> Self {
        Self {
            players: info.players.clone(),
            viewing_as_player: info.viewing_as_player,
            has_empty_slots: info.has_empty_slots,
            game_open: info.game_open,
            game_visible: info.game_visible,
            is_owner: info.is_owner,
        }
    }
}

/// One delivered bundle, with live timers already overlaid.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    pub game: GameSummary,
    pub state: ExpandedState,
    pub forms: Vec<ResolvedForm>,
    pub viewing_as_player: i64,
    /// Report transitions for this frame here.
    pub hooks: AnimationHooks,
}

/// Countdown refresh for the state on screen.
#[derive(Debug, Clone)]
pub struct TimerFrame {
    pub version: i64,
    pub state: ExpandedState,
    pub timers: TimerInfos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub versions: VersionState,
    pub viewer: ViewerParams,
    pub info_installed: bool,
    pub fetching: bool,
    pub queued: usize,
    pub phase: DeliveryPhase,
    pub outstanding_transitions: u32,
    pub connection: ConnectionState,
}

/// Callbacks the renderer uses to report transitions.
///
/// Hooks handed out with a [`RenderFrame`] are bound to that delivery and go
/// quiet once it is superseded. Hooks from [`SessionHandle::animation_hooks`]
/// apply to whatever is on screen.
#[derive(Debug, Clone)]
pub struct AnimationHooks {
    events: mpsc::UnboundedSender<SessionEvent>,
    ticket: Option<DeliveryTicket>,
}

impl AnimationHooks {
    pub fn will_animate(&self, element: impl Into<ElementRef>) {
        self.send(SessionEvent::WillAnimate {
            ticket: self.ticket,
            element: element.into(),
        });
    }

    pub fn animation_done(&self, element: impl Into<ElementRef>) {
        self.send(SessionEvent::AnimationDone {
            ticket: self.ticket,
            element: element.into(),
        });
    }

    /// Rendering has settled; completes the delivery if nothing is animating.
    pub fn ready_for_next(&self) {
        self.send(SessionEvent::ReadyForNext {
            ticket: self.ticket,
        });
    }

    fn send(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InfoPurpose {
    /// Load the chest and initial state.
    Install,
    /// Learn the latest version after a reconnect.
    Refresh,
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    SetViewer { player: i64, admin: bool },
    SetAutoCurrentPlayer(bool),
    ProposeMove(MoveProposal),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Deactivate,
}

#[derive(Debug)]
pub(crate) enum SessionEvent {
    Command(SessionCommand),
    InfoLoaded {
        generation: u64,
        purpose: InfoPurpose,
        result: Result<InfoResponse, ApiError>,
    },
    InfoRetryDue {
        generation: u64,
        purpose: InfoPurpose,
    },
    VersionLoaded {
        generation: FetchGeneration,
        result: Result<VersionResponse, ApiError>,
    },
    VersionRetryDue {
        generation: FetchGeneration,
    },
    MoveSubmitted {
        move_type: String,
        result: Result<MoveResponse, ApiError>,
    },
    DeliveryDue {
        ticket: DeliveryTicket,
    },
    SettleCheck {
        ticket: DeliveryTicket,
    },
    WillAnimate {
        ticket: Option<DeliveryTicket>,
        element: ElementRef,
    },
    AnimationDone {
        ticket: Option<DeliveryTicket>,
        element: ElementRef,
    },
    ReadyForNext {
        ticket: Option<DeliveryTicket>,
    },
    SocketOpened {
        generation: SocketGeneration,
    },
    SocketFrame {
        generation: SocketGeneration,
        text: String,
    },
    SocketClosed {
        generation: SocketGeneration,
        error: Option<TransportError>,
    },
    ReconnectDue {
        generation: SocketGeneration,
    },
    TimerTick {
        generation: u64,
    },
}

/// Control surface for a running session. Dropping it deactivates the
/// session.
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    connection: ConnectionStateObserver,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Activate a session: fetch info, then connect the push channel.
    pub fn spawn(settings: SessionSettings, deps: SessionDeps) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = GameSession::new(settings, deps, tx.clone());
        let connection = session.connection.observer();
        let task = tokio::spawn(session.run(rx));
        Self {
            events: tx,
            connection,
            task: Some(task),
        }
    }

    pub fn animation_hooks(&self) -> AnimationHooks {
        AnimationHooks {
            events: self.events.clone(),
            ticket: None,
        }
    }

    pub fn connection_state(&self) -> ConnectionStateObserver {
        self.connection.clone()
    }

    /// View the game from another seat. Queued bundles are dropped.
    pub fn set_viewer(&self, player: i64, admin: bool) {
        self.command(SessionCommand::SetViewer { player, admin });
    }

    pub fn set_auto_current_player(&self, enabled: bool) {
        self.command(SessionCommand::SetAutoCurrentPlayer(enabled));
    }

    pub fn propose_move(&self, proposal: MoveProposal) {
        self.command(SessionCommand::ProposeMove(proposal));
    }

    /// Current pipeline state, or `None` once the session has stopped.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(SessionCommand::Snapshot(tx));
        rx.await.ok()
    }

    /// Stop the session and wait for its task to exit.
    pub async fn deactivate(mut self) {
        self.command(SessionCommand::Deactivate);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "Session task ended abnormally");
            }
        }
    }

    fn command(&self, command: SessionCommand) {
        if self.events.send(SessionEvent::Command(command)).is_err() {
            tracing::debug!("Session already stopped; command dropped");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::Deactivate));
    }
}

/// A spawned helper whose result is still wanted.
#[derive(Default)]
struct TaskSlot(Option<JoinHandle<()>>);

impl TaskSlot {
    fn replace(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.0 = Some(handle);
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.0.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The delivered state and its counting-down timers.
struct LiveView {
    version: i64,
    base: ExpandedState,
    timers: TimerInfos,
}

struct GameSession {
    settings: SessionSettings,
    deps: SessionDeps,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: bool,

    queue: BundleQueue,
    gate: AnimationGate,
    reconciler: VersionReconciler,
    connection: ConnectionManager,

    chest: Option<Chest>,
    info_generation: u64,
    info_in_flight: Option<InfoPurpose>,
    live: Option<LiveView>,
    ticker_generation: u64,

    delivery: TaskSlot,
    info_task: TaskSlot,
    info_retry: TaskSlot,
    version_task: TaskSlot,
    version_retry: TaskSlot,
    socket: TaskSlot,
    reconnect: TaskSlot,
    ticker: TaskSlot,
    moves: Vec<JoinHandle<()>>,
}

impl GameSession {
    fn new(
        settings: SessionSettings,
        deps: SessionDeps,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            reconciler: VersionReconciler::new(settings.viewer),
            connection: ConnectionManager::new(settings.reconnect_delay),
            settings,
            deps,
            events,
            active: false,
            queue: BundleQueue::new(),
            gate: AnimationGate::new(),
            chest: None,
            info_generation: 0,
            info_in_flight: None,
            live: None,
            ticker_generation: 0,
            delivery: TaskSlot::default(),
            info_task: TaskSlot::default(),
            info_retry: TaskSlot::default(),
            version_task: TaskSlot::default(),
            version_retry: TaskSlot::default(),
            socket: TaskSlot::default(),
            reconnect: TaskSlot::default(),
            ticker: TaskSlot::default(),
            moves: Vec::new(),
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        self.activate();
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }
        self.deactivate();
    }

    fn handle(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match event {
            SessionEvent::Command(command) => return self.on_command(command),
            SessionEvent::InfoLoaded {
                generation,
                purpose,
                result,
            } => self.on_info_loaded(generation, purpose, result),
            SessionEvent::InfoRetryDue {
                generation,
                purpose,
            } => {
                if generation == self.info_generation && self.info_in_flight.is_none() {
                    self.request_info(purpose);
                }
            }
            SessionEvent::VersionLoaded { generation, result } => {
                self.on_version_loaded(generation, result)
            }
            SessionEvent::VersionRetryDue { generation } => {
                self.reconciler.retry_elapsed(generation);
                self.pump();
            }
            SessionEvent::MoveSubmitted { move_type, result } => {
                self.on_move_submitted(&move_type, result)
            }
            SessionEvent::DeliveryDue { ticket } => {
                if let Some(bundle) = self.queue.fire(ticket) {
                    self.deliver(ticket, bundle);
                }
            }
            SessionEvent::SettleCheck { ticket } => self.settle(Some(ticket)),
            SessionEvent::ReadyForNext { ticket } => self.settle(ticket),
            SessionEvent::WillAnimate { ticket, element } => {
                if self.is_current_delivery(ticket) {
                    self.gate.will_animate(element);
                } else {
                    tracing::debug!(%element, "Transition start for a superseded delivery");
                }
            }
            SessionEvent::AnimationDone { ticket, element } => {
                if self.is_current_delivery(ticket)
                    && self.gate.animation_done(&element) == GateStatus::AllDone
                {
                    self.finish_delivery();
                }
            }
            SessionEvent::SocketOpened { generation } => {
                if self.connection.on_open(generation) == Some(true) {
                    self.request_info(InfoPurpose::Refresh);
                }
            }
            SessionEvent::SocketFrame { generation, text } => {
                if let Some(version) = self.connection.on_frame(generation, &text) {
                    if self.reconciler.on_version_push(version) {
                        tracing::debug!(version, "Target version advanced");
                        self.pump();
                    }
                }
            }
            SessionEvent::SocketClosed { generation, error } => {
                self.on_socket_closed(generation, error)
            }
            SessionEvent::ReconnectDue { generation } => {
                if let Some(next) = self.connection.on_reconnect_due(generation) {
                    self.open_socket(next);
                }
            }
            SessionEvent::TimerTick { generation } => self.on_timer_tick(generation),
        }
        ControlFlow::Continue(())
    }

    fn on_command(&mut self, command: SessionCommand) -> ControlFlow<()> {
        match command {
            SessionCommand::SetViewer { player, admin } => self.set_viewer(player, admin),
            SessionCommand::SetAutoCurrentPlayer(enabled) => {
                if self.reconciler.set_auto_current_player(enabled) {
                    self.pump();
                }
            }
            SessionCommand::ProposeMove(proposal) => self.propose_move(proposal),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Deactivate => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn activate(&mut self) {
        self.active = true;
        self.reconciler.set_active(true);
        self.connection.set_active(true);
        tracing::info!(
            game = %self.settings.game_name,
            player = self.settings.viewer.player,
            admin = self.settings.viewer.admin,
            "Session activated"
        );
        self.request_info(InfoPurpose::Install);
    }

    fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        for slot in [
            &mut self.delivery,
            &mut self.info_task,
            &mut self.info_retry,
            &mut self.version_task,
            &mut self.version_retry,
            &mut self.socket,
            &mut self.reconnect,
            &mut self.ticker,
        ] {
            slot.cancel();
        }
        for handle in self.moves.drain(..) {
            handle.abort();
        }

        self.info_generation += 1;
        self.info_in_flight = None;
        self.ticker_generation += 1;
        self.live = None;
        let dropped = self.queue.clear();
        self.gate.disarm();
        self.reconciler.set_active(false);
        self.connection.shutdown();
        tracing::info!(dropped, "Session deactivated");
    }

    /// Start whatever the state machines now ask for.
    fn pump(&mut self) {
        if !self.active {
            return;
        }
        if let Some(fetch) = self.reconciler.poll() {
            self.fetch_versions(fetch);
        }
        if let Some(generation) = self.connection.poll_connect() {
            self.open_socket(generation);
        }
        self.arm_delivery();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            versions: self.reconciler.state(),
            viewer: self.reconciler.viewer(),
            info_installed: self.reconciler.info_installed(),
            fetching: self.reconciler.is_fetching(),
            queued: self.queue.len(),
            phase: self.queue.phase(),
            outstanding_transitions: self.gate.outstanding(),
            connection: self.connection.state(),
        }
    }

    fn spawn_event<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = SessionEvent> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = future.await;
            let _ = events.send(event);
        })
    }

    fn spawn_after(&self, delay: Duration, event: SessionEvent) -> JoinHandle<()> {
        let scheduler = Arc::clone(&self.deps.scheduler);
        self.spawn_event(async move {
            scheduler.sleep(delay).await;
            event
        })
    }

    // --- info ---

    fn request_info(&mut self, purpose: InfoPurpose) {
        match purpose {
            InfoPurpose::Install => self.info_generation += 1,
            InfoPurpose::Refresh => {
                // An install in flight already fetches the latest state.
                if self.info_in_flight.is_some() || !self.reconciler.info_installed() {
                    return;
                }
            }
        }
        self.info_retry.cancel();

        let viewer = self.reconciler.viewer();
        let query = InfoQuery {
            player: viewer.player,
            admin: viewer.admin,
            from: self.reconciler.state().last_fetched,
        };
        tracing::debug!(?purpose, path = %query.path(), "Requesting game info");

        let generation = self.info_generation;
        let api = Arc::clone(&self.deps.api);
        let handle = self.spawn_event(async move {
            let result = api.fetch_info(query).await;
            SessionEvent::InfoLoaded {
                generation,
                purpose,
                result,
            }
        });
        self.info_in_flight = Some(purpose);
        self.info_task.replace(handle);
    }

    fn on_info_loaded(
        &mut self,
        generation: u64,
        purpose: InfoPurpose,
        result: Result<InfoResponse, ApiError>,
    ) {
        if generation != self.info_generation || !self.active {
            return;
        }
        self.info_in_flight = None;

        let outcome = result
            .map_err(ServiceError::from)
            .and_then(|info| info.accepted());
        match (purpose, outcome) {
            (InfoPurpose::Install, Ok(info)) => {
                if let Err(error) = self.install_info(info) {
                    tracing::warn!(%error, "Unusable info response");
                    self.deps.renderer.show_error(&UserFacingError::from(&error));
                }
            }
            (InfoPurpose::Refresh, Ok(info)) => {
                self.deps.renderer.session_info(&SessionInfo::from(&info));
                if let Some(game) = &info.game {
                    if self.reconciler.on_version_push(game.version) {
                        tracing::info!(version = game.version, "Recovered version missed while offline");
                    }
                }
            }
            (_, Err(error)) if error.is_transient() => {
                tracing::warn!(
                    ?purpose,
                    %error,
                    retry_ms = self.settings.fetch_retry_delay.as_millis() as u64,
                    "Info request failed; retrying"
                );
                let handle = self.spawn_after(
                    self.settings.fetch_retry_delay,
                    SessionEvent::InfoRetryDue {
                        generation,
                        purpose,
                    },
                );
                self.info_retry.replace(handle);
            }
            (InfoPurpose::Install, Err(error)) => {
                tracing::warn!(%error, "Info request rejected");
                self.deps.renderer.show_error(&UserFacingError::from(&error));
            }
            (InfoPurpose::Refresh, Err(error)) => {
                tracing::warn!(%error, "Info refresh rejected");
            }
        }
        self.pump();
    }

    fn install_info(&mut self, info: InfoResponse) -> Result<(), ServiceError> {
        let session_info = SessionInfo::from(&info);
        let chest = info.chest.ok_or(ServiceError::MissingField("Chest"))?;
        let game = info.game.ok_or(ServiceError::MissingField("Game"))?;

        let bundle = Bundle::from_info(
            &game,
            &info.forms,
            info.viewing_as_player,
            &chest,
            &self.settings.game_name,
        );
        tracing::info!(
            version = bundle.version(),
            viewing_as_player = bundle.viewing_as_player,
            decks = chest.decks.len(),
            "Game info installed"
        );

        self.deps.renderer.session_info(&session_info);
        self.chest = Some(chest);
        self.reconciler.install_info(bundle.version());
        self.connection.set_info_installed(true);
        self.queue.enqueue(bundle);
        Ok(())
    }

    fn set_viewer(&mut self, player: i64, admin: bool) {
        if !self.reconciler.set_viewer(player, admin) {
            return;
        }
        let dropped = self.queue.clear();
        self.delivery.cancel();
        self.version_task.cancel();
        self.version_retry.cancel();
        self.gate.disarm();
        self.connection.set_info_installed(false);
        tracing::info!(player, admin, dropped, "Viewer changed; reloading info");
        self.request_info(InfoPurpose::Install);
    }

    // --- versions ---

    fn fetch_versions(&mut self, fetch: VersionFetch) {
        let api = Arc::clone(&self.deps.api);
        let handle = self.spawn_event(async move {
            let result = api.fetch_version(fetch.query).await;
            SessionEvent::VersionLoaded {
                generation: fetch.generation,
                result,
            }
        });
        self.version_task.replace(handle);
    }

    fn on_version_loaded(
        &mut self,
        generation: FetchGeneration,
        result: Result<VersionResponse, ApiError>,
    ) {
        if generation != self.reconciler.generation() {
            return;
        }

        let outcome = result
            .map_err(ServiceError::from)
            .and_then(|response| response.accepted());
        let response = match outcome {
            Ok(response) => response,
            Err(error) => {
                if self.reconciler.fetch_failed(generation) {
                    tracing::warn!(
                        %error,
                        retry_ms = self.settings.fetch_retry_delay.as_millis() as u64,
                        "Version fetch failed; retrying"
                    );
                    self.schedule_version_retry(generation);
                }
                return;
            }
        };

        let bundles: Vec<Bundle> = match self.chest.as_ref() {
            Some(chest) => response
                .bundles
                .iter()
                .map(|raw| Bundle::from_raw(raw, chest, &self.settings.game_name))
                .collect(),
            None => {
                tracing::warn!("Version response arrived before the chest");
                Vec::new()
            }
        };

        match self.reconciler.fetch_succeeded(generation, bundles) {
            FetchResult::Stale => {}
            FetchResult::Accepted(bundles) => {
                tracing::debug!(count = bundles.len(), "Version bundles accepted");
                for bundle in bundles {
                    self.queue.enqueue(bundle);
                }
                self.pump();
            }
            FetchResult::Stalled => self.schedule_version_retry(generation),
        }
    }

    fn schedule_version_retry(&mut self, generation: FetchGeneration) {
        let handle = self.spawn_after(
            self.settings.fetch_retry_delay,
            SessionEvent::VersionRetryDue { generation },
        );
        self.version_retry.replace(handle);
    }

    // --- delivery ---

    fn arm_delivery(&mut self) {
        let Some(scheduled) = self.queue.schedule_next() else {
            return;
        };
        let scheduler = Arc::clone(&self.deps.scheduler);
        let handle = self.spawn_event(async move {
            match scheduled.trigger {
                DeliveryTrigger::AnimationFrame => scheduler.next_frame().await,
                DeliveryTrigger::Timer(delay) => scheduler.sleep(delay).await,
            }
            SessionEvent::DeliveryDue {
                ticket: scheduled.ticket,
            }
        });
        self.delivery.replace(handle);
    }

    fn deliver(&mut self, ticket: DeliveryTicket, bundle: Bundle) {
        let timers = bundle.timers_at(Instant::now());
        let running = timers.values().any(TimerInfo::is_running);
        let Bundle {
            game,
            state,
            forms,
            viewing_as_player,
            ..
        } = bundle;
        let version = game.version;

        self.gate.reset();
        self.reconciler.mark_delivered(version);
        tracing::debug!(version, %ticket, queued = self.queue.len(), "Delivering bundle");

        let frame = RenderFrame {
            game,
            state: overlay_timers(&state, &timers),
            forms,
            viewing_as_player,
            hooks: AnimationHooks {
                events: self.events.clone(),
                ticket: Some(ticket),
            },
        };
        self.live = Some(LiveView {
            version,
            base: state,
            timers,
        });

        self.deps.renderer.render(frame);
        self.queue.mark_rendered(ticket);
        // Runs after any transition starts reported during render.
        let _ = self.events.send(SessionEvent::SettleCheck { ticket });

        if running {
            self.start_ticker();
        } else {
            self.stop_ticker();
        }
    }

    fn is_current_delivery(&self, ticket: Option<DeliveryTicket>) -> bool {
        match (ticket, self.queue.in_flight()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(ticket), Some(current)) => ticket == current,
        }
    }

    fn settle(&mut self, ticket: Option<DeliveryTicket>) {
        if self.is_current_delivery(ticket) && self.gate.settle() == GateStatus::AllDone {
            self.finish_delivery();
        }
    }

    fn finish_delivery(&mut self) {
        let Some(ticket) = self.queue.in_flight() else {
            return;
        };
        if self.queue.complete(ticket) {
            tracing::debug!(%ticket, "Delivery complete");
            self.deps.renderer.all_done();
            self.pump();
        }
    }

    // --- timers ---

    fn start_ticker(&mut self) {
        if self.ticker.is_running() {
            return;
        }
        self.ticker_generation += 1;
        let generation = self.ticker_generation;
        let interval = self.settings.timer_tick_interval;
        let scheduler = Arc::clone(&self.deps.scheduler);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            loop {
                scheduler.sleep(interval).await;
                if events.send(SessionEvent::TimerTick { generation }).is_err() {
                    break;
                }
            }
        });
        self.ticker.replace(handle);
    }

    fn stop_ticker(&mut self) {
        self.ticker_generation += 1;
        self.ticker.cancel();
    }

    fn on_timer_tick(&mut self, generation: u64) {
        if generation != self.ticker_generation {
            return;
        }
        let Some(live) = self.live.as_mut() else {
            self.stop_ticker();
            return;
        };

        let elapsed = i64::try_from(self.settings.timer_tick_interval.as_millis()).unwrap_or(i64::MAX);
        for timer in live.timers.values_mut() {
            timer.time_left = timer.time_left.saturating_sub(elapsed).max(0);
        }
        let running = live.timers.values().any(TimerInfo::is_running);
        let frame = TimerFrame {
            version: live.version,
            state: overlay_timers(&live.base, &live.timers),
            timers: live.timers.clone(),
        };
        self.deps.renderer.update_timers(frame);

        if !running {
            self.stop_ticker();
        }
    }

    // --- push channel ---

    fn open_socket(&mut self, generation: SocketGeneration) {
        let push = Arc::clone(&self.deps.push);
        let url = self.settings.socket_url.clone();
        let events = self.events.clone();
        tracing::debug!(%url, "Opening push channel");

        let handle = tokio::spawn(async move {
            let mut frames = match push.open(&url).await {
                Ok(frames) => frames,
                Err(error) => {
                    let _ = events.send(SessionEvent::SocketClosed {
                        generation,
                        error: Some(error),
                    });
                    return;
                }
            };
            if events.send(SessionEvent::SocketOpened { generation }).is_err() {
                return;
            }
            while let Some(frame) = frames.next().await {
                let event = match frame {
                    Ok(text) => SessionEvent::SocketFrame { generation, text },
                    Err(error) => {
                        let _ = events.send(SessionEvent::SocketClosed {
                            generation,
                            error: Some(error),
                        });
                        return;
                    }
                };
                if events.send(event).is_err() {
                    return;
                }
            }
            let _ = events.send(SessionEvent::SocketClosed {
                generation,
                error: None,
            });
        });
        self.socket.replace(handle);
    }

    fn on_socket_closed(&mut self, generation: SocketGeneration, error: Option<TransportError>) {
        if let Some(error) = &error {
            tracing::debug!(%error, "Push channel error");
        }
        if let Some(delay) = self.connection.on_closed(generation) {
            let handle = self.spawn_after(delay, SessionEvent::ReconnectDue { generation });
            self.reconnect.replace(handle);
        }
    }

    // --- moves ---

    fn propose_move(&mut self, proposal: MoveProposal) {
        let viewer = self.reconciler.viewer();
        let request = MoveRequest {
            move_type: proposal.move_name,
            arguments: proposal.arguments,
            player: viewer.player,
            admin: viewer.admin,
        };
        tracing::debug!(move_type = %request.move_type, player = request.player, "Submitting move");

        let api = Arc::clone(&self.deps.api);
        let handle = self.spawn_event(async move {
            let move_type = request.move_type.clone();
            let result = api.submit_move(request).await;
            SessionEvent::MoveSubmitted { move_type, result }
        });
        self.moves.retain(|handle| !handle.is_finished());
        self.moves.push(handle);
    }

    fn on_move_submitted(&mut self, move_type: &str, result: Result<MoveResponse, ApiError>) {
        match result
            .map_err(ServiceError::from)
            .and_then(|response| response.accepted())
        {
            Ok(_) => tracing::debug!(move_type, "Move accepted"),
            Err(error) => {
                tracing::warn!(move_type, %error, "Move not applied");
                self.deps.renderer.show_error(&UserFacingError::from(&error));
            }
        }
    }
}
