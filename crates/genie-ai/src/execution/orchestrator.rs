use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use genie_common::{new_correlation_id, GenieError, Notification, NotificationSink, SessionKey};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::buffered::BufferedStrategy;
use super::consumer::{StreamCallbacks, StreamConsumer, StreamSink};
use super::pool::WorkerPool;
use super::request::{CompletionRequest, CompletionResult, CompletionStatus, FailureReason};
use super::state::ExecutionState;
use super::streaming::StreamingStrategy;
use super::ExecutionStrategy;
use crate::memory::{ConversationMemoryStore, ConversationWindow, MemoryError, PushOutcome};
use crate::prompt;
use crate::resolver::{BackendHandle, BackendResolver, ResolveError, SamplingConfig};
use crate::token_tracker::TokenTracker;
use crate::{AiError, ChatResponse, Message};

/// Settings the orchestrator reads on every submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrchestratorSettings {
    /// Injected as the first System message of a fresh session. Empty
    /// disables injection.
    pub system_prompt: String,
    pub sampling: SamplingConfig,
}

/// Errors `submit` reports synchronously. Backend failures are not here;
/// they end the run with [`CompletionStatus::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<SubmitError> for GenieError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Memory(e) => GenieError::Session(e.to_string()),
            SubmitError::Resolve(e) => e.into(),
        }
    }
}

/// What a call to `submit` did.
#[derive(Debug)]
pub enum Submission {
    Started(ExecutionHandle),
    /// The session was busy; its in-flight request was cancelled and
    /// nothing new was started.
    CancelledInFlight { request_id: String },
}

impl Submission {
    pub fn into_handle(self) -> Option<ExecutionHandle> {
        match self {
            Submission::Started(handle) => Some(handle),
            Submission::CancelledInFlight { .. } => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Submission::Started(_))
    }
}

#[derive(Debug, Clone)]
struct RunCancel {
    token: CancellationToken,
    consumer: Option<Arc<StreamConsumer>>,
}

impl RunCancel {
    fn stop_stream(&self) {
        if let Some(consumer) = &self.consumer {
            consumer.stop();
        }
    }
}

/// Caller's view of one started run.
#[derive(Debug)]
pub struct ExecutionHandle {
    request_id: String,
    session: SessionKey,
    slot: Arc<Mutex<Slot>>,
    cancel: RunCancel,
    join: JoinHandle<CompletionResult>,
}

impl ExecutionHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    /// Cancel this run. No-op once the run has settled its outcome.
    pub fn cancel(&self) {
        let cancelled = {
            let slot = lock(&self.slot);
            let running = slot.state == ExecutionState::Running
                && slot
                    .run
                    .as_ref()
                    .is_some_and(|run| run.request_id == self.request_id);
            if running {
                self.cancel.token.cancel();
            }
            running
        };
        if cancelled {
            self.cancel.stop_stream();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> CompletionResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                error!(request_id = %self.request_id, "worker task failed: {e}");
                CompletionResult {
                    request_id: self.request_id,
                    text: String::new(),
                    status: CompletionStatus::Failed(FailureReason::Backend(format!(
                        "worker task failed: {e}"
                    ))),
                    duration: Duration::ZERO,
                    usage: None,
                }
            }
        }
    }
}

#[derive(Debug)]
struct ActiveRun {
    request_id: String,
    cancel: RunCancel,
}

#[derive(Debug, Default)]
struct Slot {
    state: ExecutionState,
    run: Option<ActiveRun>,
    last_status: Option<CompletionStatus>,
}

impl Slot {
    fn advance(&mut self, next: ExecutionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {next}",
            self.state
        );
        self.state = next;
    }
}

/// Everything a worker needs to carry one run to its end.
struct Run {
    request_id: String,
    session: SessionKey,
    handle: Arc<BackendHandle>,
    turn: Turn,
    timeout: Duration,
    streaming: bool,
    cancel: RunCancel,
}

/// What one submission wrote to memory.
struct Turn {
    /// The window before the submission touched it.
    before: Vec<Message>,
    /// The window right after the submission's own writes.
    after: Vec<Message>,
    /// Messages actually pushed, oldest first.
    appended: Vec<Message>,
    user: Message,
}

impl Turn {
    /// Take back this submission's writes. An untouched window goes back to
    /// `before` exactly, evictions included. Otherwise only the messages
    /// this submission pushed are removed, so concurrent edits survive.
    fn rollback(self, window: &mut ConversationWindow) {
        if window.messages() == self.after.as_slice() {
            window.replace(self.before);
            return;
        }
        for message in self.appended.iter().rev() {
            window.remove_last_matching(message);
        }
    }

    /// Store the reply, unless the window lost this turn's user message
    /// while the request ran.
    fn commit(self, window: &mut ConversationWindow, reply: Message) -> bool {
        if !window.messages().contains(&self.user) {
            return false;
        }
        window.push(reply);
        true
    }
}

enum Outcome {
    Completed(ChatResponse),
    Cancelled,
    Failed(FailureReason),
}

struct Inner {
    memory: Arc<ConversationMemoryStore>,
    resolver: Arc<BackendResolver>,
    pool: WorkerPool,
    tracker: Mutex<TokenTracker>,
    notifications: Option<Arc<dyn NotificationSink>>,
    settings: RwLock<OrchestratorSettings>,
    slots: Mutex<HashMap<SessionKey, Arc<Mutex<Slot>>>>,
}

/// Builder for [`ExecutionOrchestrator`].
pub struct OrchestratorBuilder {
    memory: Arc<ConversationMemoryStore>,
    resolver: Arc<BackendResolver>,
    pool: WorkerPool,
    settings: OrchestratorSettings,
    notifications: Option<Arc<dyn NotificationSink>>,
}

impl OrchestratorBuilder {
    pub fn settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn build(self) -> ExecutionOrchestrator {
        ExecutionOrchestrator {
            inner: Arc::new(Inner {
                memory: self.memory,
                resolver: self.resolver,
                pool: self.pool,
                tracker: Mutex::new(TokenTracker::new()),
                notifications: self.notifications,
                settings: RwLock::new(self.settings),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }
}

/// Runs completion requests: one at a time per session, any number of
/// sessions side by side.
///
/// `submit` never blocks on the backend. It records the user turn, starts
/// the run on the worker pool, and returns a handle. Submitting to a busy
/// session cancels the running request instead of starting another.
#[derive(Clone)]
pub struct ExecutionOrchestrator {
    inner: Arc<Inner>,
}

impl ExecutionOrchestrator {
    pub fn builder(
        memory: Arc<ConversationMemoryStore>,
        resolver: Arc<BackendResolver>,
        pool: WorkerPool,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            memory,
            resolver,
            pool,
            settings: OrchestratorSettings::default(),
            notifications: None,
        }
    }

    /// Submit without a sink. Streaming requests still stream, but nobody
    /// sees the fragments; the result arrives through the handle.
    pub fn submit(&self, request: CompletionRequest) -> Result<Submission, SubmitError> {
        self.inner.start(request, None)
    }

    /// Submit with a sink for fragments and the terminal callback.
    pub fn submit_with_sink(
        &self,
        request: CompletionRequest,
        sink: Arc<dyn StreamSink>,
    ) -> Result<Submission, SubmitError> {
        self.inner.start(request, Some(sink))
    }

    /// The "stop" button. Returns `true` if a run was cancelled.
    pub fn cancel(&self, session: &SessionKey) -> bool {
        let slot = self.inner.existing_slot(session);
        let Some(slot) = slot else {
            return false;
        };
        let cancel = {
            let slot = lock(&slot);
            match (&slot.state, &slot.run) {
                (ExecutionState::Running, Some(run)) => {
                    run.cancel.token.cancel();
                    Some(run.cancel.clone())
                }
                _ => None,
            }
        };
        match cancel {
            Some(cancel) => {
                cancel.stop_stream();
                info!(session = %session, "request cancelled by caller");
                true
            }
            None => false,
        }
    }

    pub fn state(&self, session: &SessionKey) -> ExecutionState {
        self.inner
            .existing_slot(session)
            .map_or(ExecutionState::Idle, |slot| lock(&slot).state)
    }

    pub fn is_running(&self, session: &SessionKey) -> bool {
        self.state(session) == ExecutionState::Running
    }

    /// Status of the most recent finished run of `session`.
    pub fn last_status(&self, session: &SessionKey) -> Option<CompletionStatus> {
        self.inner
            .existing_slot(session)
            .and_then(|slot| lock(&slot).last_status.clone())
    }

    /// Make sure `session` has a memory window. Returns `true` if created.
    pub fn open_session(&self, session: &SessionKey) -> bool {
        self.inner.memory.open(session)
    }

    pub fn memory(&self) -> &Arc<ConversationMemoryStore> {
        &self.inner.memory
    }

    pub fn resolver(&self) -> &Arc<BackendResolver> {
        &self.inner.resolver
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    pub fn settings(&self) -> OrchestratorSettings {
        self.inner.settings()
    }

    /// Applies to submissions made after this call.
    pub fn update_settings(&self, settings: OrchestratorSettings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(|e| e.into_inner()) = settings;
        debug!("orchestrator settings updated");
    }

    /// Snapshot of accumulated token usage.
    pub fn token_usage(&self) -> TokenTracker {
        self.inner
            .tracker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Inner {
    fn start(
        self: &Arc<Self>,
        request: CompletionRequest,
        sink: Option<Arc<dyn StreamSink>>,
    ) -> Result<Submission, SubmitError> {
        let session = request.session.clone();
        let slot = self.slot(&session);
        let mut guard = lock(&slot);
        let run_slot = Arc::clone(&slot);

        if guard.state == ExecutionState::Running {
            let in_flight = guard.run.as_ref().map(|run| {
                run.cancel.token.cancel();
                (run.request_id.clone(), run.cancel.clone())
            });
            drop(guard);
            let request_id = match in_flight {
                Some((request_id, cancel)) => {
                    cancel.stop_stream();
                    request_id
                }
                None => String::new(),
            };
            info!(session = %session, request_id = %request_id, "submit while running, cancelling");
            return Ok(Submission::CancelledInFlight { request_id });
        }

        let settings = self.settings();
        let handle = match self
            .resolver
            .resolve(request.provider, &request.model, &settings.sampling)
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(session = %session, provider = %request.provider, model = %request.model, "{e}");
                self.notify(
                    Notification::error("Model unavailable", e.to_string()).for_session(session),
                );
                return Err(e.into());
            }
        };

        self.memory.open(&session);
        let turn = self.memory.with_window(&session, |window| {
            let before = window.snapshot();
            let mut appended = Vec::new();
            let mut inline_system = None;
            if window.is_empty() && !settings.system_prompt.trim().is_empty() {
                if handle.supports_system_message() {
                    let system = Message::system(settings.system_prompt.clone());
                    if let PushOutcome::Appended { .. } = window.push(system.clone()) {
                        appended.push(system);
                    }
                } else {
                    inline_system = Some(settings.system_prompt.as_str());
                }
            }
            let text = prompt::user_turn(&request.prompt, request.context.as_deref(), inline_system);
            let user = Message::user(text).with_attachments(request.attachments.clone());
            if let PushOutcome::Appended { .. } = window.push(user.clone()) {
                appended.push(user.clone());
            }
            Turn {
                before,
                after: window.snapshot(),
                appended,
                user,
            }
        })?;

        let request_id = new_correlation_id();
        let consumer = if request.streaming || sink.is_some() {
            let sink =
                sink.unwrap_or_else(|| Arc::new(StreamCallbacks::new()) as Arc<dyn StreamSink>);
            Some(Arc::new(StreamConsumer::new(sink)))
        } else {
            None
        };
        let cancel = RunCancel {
            token: CancellationToken::new(),
            consumer,
        };

        guard.advance(ExecutionState::Running);
        guard.run = Some(ActiveRun {
            request_id: request_id.clone(),
            cancel: cancel.clone(),
        });
        drop(guard);

        info!(
            session = %session,
            request_id = %request_id,
            provider = %request.provider,
            model = %request.model,
            streaming = request.streaming,
            "request started"
        );

        let run = Run {
            request_id: request_id.clone(),
            session: session.clone(),
            handle,
            turn,
            timeout: request.effective_timeout(),
            streaming: request.streaming,
            cancel: cancel.clone(),
        };
        let inner = Arc::clone(self);
        let join = self.pool.spawn(async move { inner.execute(run).await });

        Ok(Submission::Started(ExecutionHandle {
            request_id,
            session,
            slot: run_slot,
            cancel,
            join,
        }))
    }

    async fn execute(&self, run: Run) -> CompletionResult {
        let started = Instant::now();

        let outcome = match self.memory.messages(&run.session) {
            Err(e) => Outcome::Failed(FailureReason::Backend(e.to_string())),
            Ok(snapshot) => {
                let strategy: Box<dyn ExecutionStrategy> = match (&run.cancel.consumer, run.streaming) {
                    (Some(consumer), true) => Box::new(StreamingStrategy::new(Arc::clone(consumer))),
                    _ => Box::new(BufferedStrategy),
                };
                let call = AssertUnwindSafe(strategy.run(&snapshot, &run.handle)).catch_unwind();

                tokio::select! {
                    biased;
                    _ = run.cancel.token.cancelled() => Outcome::Cancelled,
                    result = tokio::time::timeout(run.timeout, call) => match result {
                        Err(_elapsed) => Outcome::Failed(FailureReason::Timeout),
                        Ok(Err(payload)) => Outcome::Failed(FailureReason::Backend(panic_message(payload))),
                        Ok(Ok(Err(AiError::Timeout))) => Outcome::Failed(FailureReason::Timeout),
                        Ok(Ok(Err(e))) => Outcome::Failed(FailureReason::Backend(e.to_string())),
                        Ok(Ok(Ok(response))) => Outcome::Completed(response),
                    },
                }
            }
        };

        self.finalize(run, outcome, started.elapsed())
    }

    /// Settle memory and state under the session slot lock, then tell the
    /// sink and the notification channel.
    fn finalize(&self, run: Run, outcome: Outcome, duration: Duration) -> CompletionResult {
        let slot = self.slot(&run.session);
        let mut guard = lock(&slot);

        let (status, response) = if run.cancel.token.is_cancelled() {
            (CompletionStatus::Cancelled, None)
        } else {
            match outcome {
                Outcome::Completed(response) => (CompletionStatus::Completed, Some(response)),
                Outcome::Cancelled => (CompletionStatus::Cancelled, None),
                Outcome::Failed(reason) => (CompletionStatus::Failed(reason), None),
            }
        };
        let (text, usage) = response.map_or((String::new(), None), |r| (r.content, r.usage));

        let turn = run.turn;
        let memory_result = self.memory.with_window(&run.session, |window| match &status {
            CompletionStatus::Completed => turn.commit(window, Message::assistant(text.clone())),
            _ => {
                turn.rollback(window);
                true
            }
        });
        match memory_result {
            Ok(true) => {}
            Ok(false) => {
                warn!(session = %run.session, request_id = %run.request_id, "memory reset during the request, reply not stored")
            }
            Err(e) => {
                error!(session = %run.session, request_id = %run.request_id, "memory update failed: {e}")
            }
        }

        guard.advance(ExecutionState::from_status(&status));
        guard.advance(ExecutionState::Idle);
        if guard
            .run
            .as_ref()
            .is_some_and(|active| active.request_id == run.request_id)
        {
            guard.run = None;
        }
        guard.last_status = Some(status.clone());
        drop(guard);

        let provider = run.handle.provider();
        match &status {
            CompletionStatus::Completed => {
                if let Some(usage) = &usage {
                    self.tracker
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .record(provider, &run.session, usage);
                }
                if let Some(consumer) = &run.cancel.consumer {
                    consumer.complete(&text, usage);
                }
                info!(
                    session = %run.session,
                    request_id = %run.request_id,
                    elapsed_ms = duration.as_millis() as u64,
                    "request completed"
                );
            }
            CompletionStatus::Cancelled => {
                run.cancel.stop_stream();
                info!(session = %run.session, request_id = %run.request_id, "request cancelled");
            }
            CompletionStatus::Failed(reason) => {
                if let Some(consumer) = &run.cancel.consumer {
                    consumer.fail(reason);
                }
                match reason {
                    FailureReason::Timeout => {
                        warn!(session = %run.session, request_id = %run.request_id, "request timed out")
                    }
                    FailureReason::Backend(msg) => {
                        error!(session = %run.session, request_id = %run.request_id, provider = %provider, "request failed: {msg}")
                    }
                }
                self.notify(
                    Notification::error("Request failed", reason.to_string())
                        .for_session(run.session.clone()),
                );
            }
        }

        CompletionResult {
            request_id: run.request_id,
            text,
            status,
            duration,
            usage,
        }
    }

    fn settings(&self) -> OrchestratorSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn notify(&self, notification: Notification) {
        if let Some(sink) = &self.notifications {
            sink.notify(notification);
        }
    }

    fn slot(&self, session: &SessionKey) -> Arc<Mutex<Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(session.clone()).or_default())
    }

    fn existing_slot(&self, session: &SessionKey) -> Option<Arc<Mutex<Slot>>> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(session)
            .cloned()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else {
        "unknown panic payload"
    };
    format!("backend panicked: {detail}")
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}
