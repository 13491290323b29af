use crate::{Message, Role};

/// Result of pushing a message onto a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored; `evicted` older messages were dropped to stay within capacity.
    Appended { evicted: usize },
    /// Same role and text as the current last message; nothing changed.
    Duplicate,
}

/// Bounded, ordered message log of one session.
///
/// `len() <= capacity()` holds after every mutation. Eviction drops whole
/// exchanges (a User message and the Assistant replies that follow it)
/// oldest first. A leading System message is kept while anything else
/// remains. When the oldest exchange reaches the newest message, eviction
/// falls back to dropping single messages.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    messages: Vec<Message>,
    capacity: usize,
}

impl ConversationWindow {
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn push(&mut self, message: Message) -> PushOutcome {
        if self.messages.last().is_some_and(|last| last.same_turn(&message)) {
            return PushOutcome::Duplicate;
        }
        self.messages.push(message);
        PushOutcome::Appended {
            evicted: self.evict(),
        }
    }

    pub fn remove_last(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    /// Drop every message equal to one in `to_remove`. Survivors keep their order.
    pub fn remove_all(&mut self, to_remove: &[Message]) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !to_remove.contains(m));
        before - self.messages.len()
    }

    /// Drop the newest message equal to `message`, wherever it sits.
    pub fn remove_last_matching(&mut self, message: &Message) -> bool {
        match self.messages.iter().rposition(|m| m == message) {
            Some(idx) => {
                self.messages.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Clear and resize in one step.
    pub fn reset(&mut self, capacity: usize) {
        self.messages.clear();
        self.capacity = capacity.max(1);
    }

    /// Change capacity, evicting as needed. Returns the number evicted.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        self.evict()
    }

    /// Replace the contents wholesale, then trim to capacity.
    pub fn replace(&mut self, messages: Vec<Message>) -> usize {
        self.messages = messages;
        self.evict()
    }

    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.messages.len() > self.capacity {
            let len = self.messages.len();
            let start = if len > 1 && self.messages[0].role == Role::System {
                1
            } else {
                0
            };
            let end = self.unit_end(start);

            if end < len {
                evicted += end - start;
                self.messages.drain(start..end);
            } else if start + 1 < len {
                self.messages.remove(start);
                evicted += 1;
            } else {
                self.messages.remove(0);
                evicted += 1;
            }
        }
        evicted
    }

    /// Exclusive end of the eviction unit starting at `start`.
    fn unit_end(&self, start: usize) -> usize {
        let mut end = start + 1;
        if self.messages[start].role == Role::User {
            while end < self.messages.len() && self.messages[end].role == Role::Assistant {
                end += 1;
            }
        }
        end
    }
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(super::DEFAULT_CAPACITY)
    }
}
