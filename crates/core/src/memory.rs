//! Conversation memory: the bounded, ordered log of messages an agent
//! has seen during its lifetime.
//!
//! The bound is enforced on every append. When a new message (or batch)
//! would push the log past `max_messages`, the oldest messages are evicted
//! first and the survivors keep their relative order.

use crate::message::Message;

/// Default upper bound on retained messages.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone)]
pub struct Memory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl Memory {
    /// Create an empty memory holding at most `max_messages` messages.
    ///
    /// A bound of zero is treated as one; an agent always keeps at least
    /// the most recent turn.
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Append a single message, evicting from the front if needed.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.enforce_bound();
    }

    /// Append a batch in input order, then enforce the bound once.
    pub fn append_many(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.enforce_bound();
    }

    /// An owned, ordered copy of the current log.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Borrow the current log without copying.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages (or fewer, if the log is shorter).
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn enforce_bound(&mut self) {
        if self.messages.len() > self.max_messages {
            let overflow = self.messages.len() - self.max_messages;
            self.messages.drain(..overflow);
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(memory: &Memory) -> Vec<String> {
        memory.messages().iter().map(|m| m.text().to_string()).collect()
    }

    #[test]
    fn default_bound_is_one_hundred() {
        assert_eq!(Memory::default().max_messages(), 100);
    }

    #[test]
    fn append_evicts_oldest_first() {
        let mut memory = Memory::new(3);
        for i in 0..5 {
            memory.append(Message::user(format!("m{i}")));
        }
        assert_eq!(memory.len(), 3);
        assert_eq!(texts(&memory), vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn batch_append_preserves_order_and_bound() {
        let mut memory = Memory::new(4);
        memory.append(Message::user("a"));
        memory.append(Message::user("b"));
        memory.append_many(["c", "d", "e"].map(Message::user));
        assert_eq!(texts(&memory), vec!["b", "c", "d", "e"]);
    }

    #[test]
    fn batch_larger_than_bound_keeps_tail() {
        let mut memory = Memory::new(2);
        memory.append_many((0..6).map(|i| Message::user(format!("m{i}"))));
        assert_eq!(texts(&memory), vec!["m4", "m5"]);
    }

    #[test]
    fn bound_holds_for_any_sequence() {
        let mut memory = Memory::new(7);
        for round in 0..20 {
            if round % 3 == 0 {
                memory.append_many((0..round).map(|i| Message::user(format!("{round}-{i}"))));
            } else {
                memory.append(Message::user(format!("{round}")));
            }
            assert!(memory.len() <= 7);
        }
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut memory = Memory::new(10);
        memory.append(Message::user("first"));
        let snapshot = memory.snapshot();
        memory.append(Message::user("second"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn recent_and_clear() {
        let mut memory = Memory::new(10);
        memory.append_many(["a", "b", "c"].map(Message::user));
        let recent: Vec<_> = memory.recent(2).iter().map(|m| m.text()).collect();
        assert_eq!(recent, vec!["b", "c"]);
        assert_eq!(memory.recent(10).len(), 3);

        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.last().is_none());
    }
}
