use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use genie_common::SessionKey;
use tracing::{debug, warn};

use super::window::{ConversationWindow, PushOutcome};
use super::{MemoryError, DEFAULT_CAPACITY};
use crate::Message;

type SharedWindow = Arc<Mutex<ConversationWindow>>;

/// All sessions' conversation windows.
///
/// The session map is only write-locked to add a session; every window
/// operation takes that session's own mutex, so appends on one session are
/// totally ordered and never wait on another session.
pub struct ConversationMemoryStore {
    sessions: RwLock<HashMap<SessionKey, SharedWindow>>,
    default_capacity: AtomicUsize,
}

impl ConversationMemoryStore {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_capacity: AtomicUsize::new(default_capacity.max(1)),
        }
    }

    /// Capacity given to sessions created by [`open`](Self::open).
    pub fn default_capacity(&self) -> usize {
        self.default_capacity.load(Ordering::Acquire)
    }

    /// (Re)create an empty window of `max_messages` for `session`.
    pub fn initialize(&self, session: &SessionKey, max_messages: usize) {
        if let Some(window) = self.window(session) {
            lock(&window).reset(max_messages);
        } else {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            match sessions.get(session) {
                Some(window) => lock(window).reset(max_messages),
                None => {
                    sessions.insert(
                        session.clone(),
                        Arc::new(Mutex::new(ConversationWindow::new(max_messages))),
                    );
                }
            }
        }
        debug!(session = %session, max_messages, "memory initialized");
    }

    /// Initialize `session` with the default capacity unless it already
    /// exists. Returns `true` if it was created.
    pub fn open(&self, session: &SessionKey) -> bool {
        if self.window(session).is_some() {
            return false;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if sessions.contains_key(session) {
            return false;
        }
        let capacity = self.default_capacity();
        sessions.insert(
            session.clone(),
            Arc::new(Mutex::new(ConversationWindow::new(capacity))),
        );
        debug!(session = %session, capacity, "memory opened");
        true
    }

    /// Append a message. Returns `false` when it was dropped as a duplicate
    /// of the current last message.
    pub fn append(&self, session: &SessionKey, message: Message) -> Result<bool, MemoryError> {
        let window = self.require(session)?;
        let mut window = lock(&window);
        match window.push(message) {
            PushOutcome::Appended { evicted } => {
                debug!(session = %session, len = window.len(), evicted, "message appended");
                Ok(true)
            }
            PushOutcome::Duplicate => {
                warn!(session = %session, "dropped duplicate of last message");
                Ok(false)
            }
        }
    }

    pub fn messages(&self, session: &SessionKey) -> Result<Vec<Message>, MemoryError> {
        let window = self.require(session)?;
        let snapshot = lock(&window).snapshot();
        Ok(snapshot)
    }

    /// `true` for unknown sessions too.
    pub fn is_empty(&self, session: &SessionKey) -> bool {
        self.window(session).map_or(true, |w| lock(&w).is_empty())
    }

    pub fn len(&self, session: &SessionKey) -> usize {
        self.window(session).map_or(0, |w| lock(&w).len())
    }

    pub fn capacity(&self, session: &SessionKey) -> Option<usize> {
        self.window(session).map(|w| lock(&w).capacity())
    }

    pub fn remove_last(&self, session: &SessionKey) -> Option<Message> {
        let window = self.window(session)?;
        let removed = lock(&window).remove_last();
        if removed.is_some() {
            debug!(session = %session, "removed last message");
        }
        removed
    }

    pub fn remove_messages(&self, session: &SessionKey, to_remove: &[Message]) -> usize {
        self.window(session)
            .map_or(0, |w| lock(&w).remove_all(to_remove))
    }

    pub fn remove_last_matching(&self, session: &SessionKey, message: &Message) -> bool {
        self.window(session)
            .is_some_and(|w| lock(&w).remove_last_matching(message))
    }

    pub fn clear(&self, session: &SessionKey) {
        if let Some(window) = self.window(session) {
            lock(&window).clear();
            debug!(session = %session, "memory cleared");
        }
    }

    /// Atomically replace a session's messages with `snapshot`.
    pub fn restore(&self, session: &SessionKey, snapshot: Vec<Message>) -> Result<(), MemoryError> {
        let window = self.require(session)?;
        let evicted = lock(&window).replace(snapshot);
        debug!(session = %session, evicted, "memory restored");
        Ok(())
    }

    /// Apply a new global window size to every existing session and to
    /// sessions opened later.
    pub fn on_capacity_changed(&self, new_size: usize) {
        let new_size = new_size.max(1);
        self.default_capacity.store(new_size, Ordering::Release);

        let windows: Vec<(SessionKey, SharedWindow)> = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, w)| (k.clone(), Arc::clone(w)))
            .collect();

        for (session, window) in windows {
            let evicted = lock(&window).set_capacity(new_size);
            if evicted > 0 {
                debug!(session = %session, evicted, "evicted after capacity change");
            }
        }
    }

    pub fn sessions(&self) -> Vec<SessionKey> {
        let mut keys: Vec<_> = self
            .sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Run `f` with the session's window locked, for compound updates that
    /// must not interleave with other mutations.
    pub(crate) fn with_window<R>(
        &self,
        session: &SessionKey,
        f: impl FnOnce(&mut ConversationWindow) -> R,
    ) -> Result<R, MemoryError> {
        let window = self.require(session)?;
        let mut window = lock(&window);
        Ok(f(&mut window))
    }

    fn window(&self, session: &SessionKey) -> Option<SharedWindow> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session)
            .cloned()
    }

    fn require(&self, session: &SessionKey) -> Result<SharedWindow, MemoryError> {
        self.window(session)
            .ok_or_else(|| MemoryError::UninitializedSession(session.clone()))
    }
}

impl Default for ConversationMemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn lock(window: &SharedWindow) -> MutexGuard<'_, ConversationWindow> {
    window.lock().unwrap_or_else(|e| e.into_inner())
}
