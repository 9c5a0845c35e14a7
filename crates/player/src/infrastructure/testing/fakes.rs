//! Scriptable in-memory adapters for driving a session in tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use boardsync_protocol::{
    InfoQuery, InfoResponse, MoveRequest, MoveResponse, TimerInfos, VersionQuery, VersionResponse,
};

use crate::application::{
    AnimationHooks, ElementRef, RenderFrame, SessionInfo, TimerFrame, UserFacingError,
};
use crate::ports::outbound::{
    ApiError, GameApiPort, PushFrames, PushTransport, RendererPort, TransportError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unscripted() -> ApiError {
    ApiError::transport("no scripted response")
}

/// Game API that replays scripted responses in order and records requests.
///
/// Once a script runs dry every further call fails with a transport error.
#[derive(Default)]
pub struct FakeGameApi {
    info: Mutex<VecDeque<Result<InfoResponse, ApiError>>>,
    versions: Mutex<VecDeque<Result<VersionResponse, ApiError>>>,
    moves: Mutex<VecDeque<Result<MoveResponse, ApiError>>>,
    info_queries: Mutex<Vec<InfoQuery>>,
    version_queries: Mutex<Vec<VersionQuery>>,
    move_requests: Mutex<Vec<MoveRequest>>,
    version_latency: Mutex<Duration>,
}

impl FakeGameApi {
    /// Hold every version response for `latency` before answering.
    pub fn delay_versions(&self, latency: Duration) {
        *lock(&self.version_latency) = latency;
    }

    pub fn script_info(&self, response: Result<InfoResponse, ApiError>) {
        lock(&self.info).push_back(response);
    }

    pub fn script_version(&self, response: Result<VersionResponse, ApiError>) {
        lock(&self.versions).push_back(response);
    }

    pub fn script_move(&self, response: Result<MoveResponse, ApiError>) {
        lock(&self.moves).push_back(response);
    }

    pub fn info_queries(&self) -> Vec<InfoQuery> {
        lock(&self.info_queries).clone()
    }

    pub fn version_queries(&self) -> Vec<VersionQuery> {
        lock(&self.version_queries).clone()
    }

    pub fn move_requests(&self) -> Vec<MoveRequest> {
        lock(&self.move_requests).clone()
    }
}

#[async_trait]
impl GameApiPort for FakeGameApi {
    async fn fetch_info(&self, query: InfoQuery) -> Result<InfoResponse, ApiError> {
        lock(&self.info_queries).push(query);
        lock(&self.info).pop_front().unwrap_or_else(|| Err(unscripted()))
    }

    async fn fetch_version(&self, query: VersionQuery) -> Result<VersionResponse, ApiError> {
        lock(&self.version_queries).push(query);
        let latency = *lock(&self.version_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        lock(&self.versions).pop_front().unwrap_or_else(|| Err(unscripted()))
    }

    async fn submit_move(&self, request: MoveRequest) -> Result<MoveResponse, ApiError> {
        lock(&self.move_requests).push(request);
        lock(&self.moves).pop_front().unwrap_or_else(|| Err(unscripted()))
    }
}

type FrameSender = mpsc::UnboundedSender<Result<String, TransportError>>;

/// Push transport whose connections are fed by the test.
#[derive(Default)]
pub struct FakePushTransport {
    connections: Mutex<Vec<FrameSender>>,
    opened_urls: Mutex<Vec<String>>,
    refusals: Mutex<u32>,
}

impl FakePushTransport {
    /// Send a text frame on the newest connection.
    pub fn send_frame(&self, text: &str) -> bool {
        lock(&self.connections)
            .last()
            .is_some_and(|tx| tx.send(Ok(text.to_string())).is_ok())
    }

    /// Fail the newest connection with a stream error.
    pub fn fail(&self, message: &str) -> bool {
        lock(&self.connections)
            .last()
            .is_some_and(|tx| tx.send(Err(TransportError::Stream(message.to_string()))).is_ok())
    }

    /// Close the newest connection from the server side.
    pub fn close(&self) {
        lock(&self.connections).pop();
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: u32) {
        *lock(&self.refusals) = count;
    }

    pub fn open_count(&self) -> usize {
        lock(&self.opened_urls).len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.opened_urls).clone()
    }

    /// Whether the client still holds the newest connection.
    pub fn is_open(&self) -> bool {
        lock(&self.connections)
            .last()
            .is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl PushTransport for FakePushTransport {
    async fn open(&self, url: &str) -> Result<PushFrames, TransportError> {
        lock(&self.opened_urls).push(url.to_string());
        {
            let mut refusals = lock(&self.refusals);
            if *refusals > 0 {
                *refusals -= 1;
                return Err(TransportError::Connect("connection refused".to_string()));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.connections).push(tx);
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RendererCall {
    Render { version: i64 },
    UpdateTimers { version: i64, timers: TimerInfos },
    AllDone,
    ShowError(UserFacingError),
    SessionInfo(SessionInfo),
}

/// Renderer that records every call. It can start transitions on render
/// and keeps the latest frame's hooks so a test can finish them.
#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RendererCall>>,
    animate: Mutex<Vec<ElementRef>>,
    hooks: Mutex<Option<AnimationHooks>>,
}

impl RecordingRenderer {
    /// Start a transition for each element on every subsequent render.
    pub fn animate_on_render(&self, elements: &[&str]) {
        *lock(&self.animate) = elements.iter().map(|id| ElementRef::from(*id)).collect();
    }

    pub fn calls(&self) -> Vec<RendererCall> {
        lock(&self.calls).clone()
    }

    pub fn rendered_versions(&self) -> Vec<i64> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RendererCall::Render { version } => Some(*version),
                _ => None,
            })
            .collect()
    }

    pub fn all_done_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, RendererCall::AllDone))
            .count()
    }

    pub fn errors(&self) -> Vec<UserFacingError> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RendererCall::ShowError(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn timer_updates(&self) -> Vec<TimerInfos> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RendererCall::UpdateTimers { timers, .. } => Some(timers.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_hooks(&self) -> Option<AnimationHooks> {
        lock(&self.hooks).clone()
    }
}

impl RendererPort for RecordingRenderer {
    fn render(&self, frame: RenderFrame) {
        lock(&self.calls).push(RendererCall::Render {
            version: frame.game.version,
        });
        for element in lock(&self.animate).iter() {
            frame.hooks.will_animate(element.clone());
        }
        *lock(&self.hooks) = Some(frame.hooks);
    }

    fn update_timers(&self, frame: TimerFrame) {
        lock(&self.calls).push(RendererCall::UpdateTimers {
            version: frame.version,
            timers: frame.timers,
        });
    }

    fn all_done(&self) {
        lock(&self.calls).push(RendererCall::AllDone);
    }

    fn show_error(&self, error: &UserFacingError) {
        lock(&self.calls).push(RendererCall::ShowError(error.clone()));
    }

    fn session_info(&self, info: &SessionInfo) {
        lock(&self.calls).push(RendererCall::SessionInfo(info.clone()));
    }
}
