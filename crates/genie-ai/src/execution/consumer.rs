use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use super::request::FailureReason;
use crate::TokenUsage;

/// Receiver of a streamed reply.
///
/// Calls arrive from whatever thread the backend transport uses, one at a
/// time per stream.
pub trait StreamSink: Send + Sync {
    fn on_token(&self, token: &str);
    fn on_complete(&self, text: &str, usage: Option<TokenUsage>);
    fn on_error(&self, reason: &FailureReason);
}

type TokenFn = Box<dyn Fn(&str) + Send + Sync>;
type CompleteFn = Box<dyn Fn(&str, Option<TokenUsage>) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&FailureReason) + Send + Sync>;

/// A [`StreamSink`] assembled from closures. Missing callbacks do nothing.
pub struct StreamCallbacks {
    on_token: TokenFn,
    on_complete: CompleteFn,
    on_error: ErrorFn,
}

impl StreamCallbacks {
    pub fn new() -> Self {
        Self {
            on_token: Box::new(|_| {}),
            on_complete: Box::new(|_, _| {}),
            on_error: Box::new(|_| {}),
        }
    }

    pub fn on_token(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_token = Box::new(f);
        self
    }

    pub fn on_complete(
        mut self,
        f: impl Fn(&str, Option<TokenUsage>) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Box::new(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&FailureReason) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }
}

impl Default for StreamCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSink for StreamCallbacks {
    fn on_token(&self, token: &str) {
        (self.on_token)(token)
    }

    fn on_complete(&self, text: &str, usage: Option<TokenUsage>) {
        (self.on_complete)(text, usage)
    }

    fn on_error(&self, reason: &FailureReason) {
        (self.on_error)(reason)
    }
}

/// Lifecycle of one streamed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Started,
    Streaming,
    Completed,
    Stopped,
    Errored,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamPhase::Completed | StreamPhase::Stopped | StreamPhase::Errored
        )
    }
}

struct Gate {
    phase: StreamPhase,
    text: String,
    /// Thread currently inside a sink callback.
    busy: Option<ThreadId>,
}

/// Stop-safe bridge between a backend's token callback and a [`StreamSink`].
///
/// Once [`stop`](Self::stop) returns, the sink receives nothing more: a
/// callback already running on another thread is waited for, and every
/// later fragment is dropped. `on_complete` and `on_error` fire at most once
/// between them, and never after a stop.
pub struct StreamConsumer {
    sink: Arc<dyn StreamSink>,
    /// Set on stop and on any terminal transition; checked before delivery.
    closed: AtomicBool,
    gate: Mutex<Gate>,
    idle: Condvar,
}

impl StreamConsumer {
    pub fn new(sink: Arc<dyn StreamSink>) -> Self {
        Self {
            sink,
            closed: AtomicBool::new(false),
            gate: Mutex::new(Gate {
                phase: StreamPhase::Started,
                text: String::new(),
                busy: None,
            }),
            idle: Condvar::new(),
        }
    }

    /// Hand one fragment to the sink. Returns `false` if it was swallowed.
    pub fn deliver(&self, token: &str) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let me = thread::current().id();
        let gate = self.lock();
        if gate.busy == Some(me) {
            // Re-entered from inside a callback.
            return false;
        }
        let mut gate = self.wait_idle(gate, me);
        if self.closed.load(Ordering::Acquire) || gate.phase.is_terminal() {
            return false;
        }
        gate.phase = StreamPhase::Streaming;
        gate.text.push_str(token);
        gate.busy = Some(me);
        drop(gate);

        let _busy = BusyGuard(self);
        self.sink.on_token(token);
        true
    }

    /// Idempotent; callable from any thread, including from inside a sink
    /// callback. Returns `true` if this call ended a live stream.
    pub fn stop(&self) -> bool {
        let me = thread::current().id();
        let gate = self.lock();
        self.closed.store(true, Ordering::Release);
        let mut gate = self.wait_idle(gate, me);
        if gate.phase.is_terminal() {
            false
        } else {
            gate.phase = StreamPhase::Stopped;
            true
        }
    }

    /// Fire `on_complete` with the final text, unless stopped or finished.
    pub fn complete(&self, text: &str, usage: Option<TokenUsage>) -> bool {
        self.finish(StreamPhase::Completed, |sink| sink.on_complete(text, usage))
    }

    /// Fire `on_error`, unless stopped or finished.
    pub fn fail(&self, reason: &FailureReason) -> bool {
        self.finish(StreamPhase::Errored, |sink| sink.on_error(reason))
    }

    /// Everything delivered so far, concatenated.
    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    pub fn phase(&self) -> StreamPhase {
        self.lock().phase
    }

    pub fn is_stopped(&self) -> bool {
        self.phase() == StreamPhase::Stopped
    }

    fn finish(&self, phase: StreamPhase, notify: impl FnOnce(&dyn StreamSink)) -> bool {
        let me = thread::current().id();
        let gate = self.lock();
        let mut gate = self.wait_idle(gate, me);
        if self.closed.load(Ordering::Acquire) || gate.phase.is_terminal() {
            return false;
        }
        self.closed.store(true, Ordering::Release);
        gate.phase = phase;
        gate.busy = Some(me);
        drop(gate);

        let _busy = BusyGuard(self);
        notify(self.sink.as_ref());
        true
    }

    /// Block until no other thread is inside a callback.
    fn wait_idle<'a>(&'a self, mut gate: MutexGuard<'a, Gate>, me: ThreadId) -> MutexGuard<'a, Gate> {
        while gate.busy.is_some_and(|t| t != me) {
            gate = self.idle.wait(gate).unwrap_or_else(|e| e.into_inner());
        }
        gate
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for StreamConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConsumer")
            .field("phase", &self.phase())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Clears the busy marker even if the sink panics.
struct BusyGuard<'a>(&'a StreamConsumer);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().busy = None;
        self.0.idle.notify_all();
    }
}
