//! External state seen by condition expressions.

use plexec_core::node::ExprContext;
use plexec_core::queue::Message;
use plexec_core::value::Value;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Lookup values, plan variables and the message pass-through store.
#[derive(Debug, Default)]
pub struct StateCache {
    time_state: String,
    lookups: HashMap<String, Value>,
    variables: HashMap<String, Value>,
    inbox: VecDeque<Message>,
    accepted: HashMap<String, Message>,
    messages_exhausted: bool,
}

impl StateCache {
    /// Create a cache treating `time_state` as the monotonic clock.
    pub fn new(time_state: impl Into<String>) -> Self {
        Self {
            time_state: time_state.into(),
            ..Self::default()
        }
    }

    /// Record a lookup value. Returns false if it was dropped as stale or
    /// matches the cached value.
    ///
    /// Time values must strictly increase; anything else is stale.
    pub fn update_lookup(&mut self, state: &str, value: Value) -> bool {
        let unchanged = self
            .lookups
            .get(state)
            .map_or(value.is_unknown(), |cached| *cached == value);
        if unchanged {
            return false;
        }
        if state == self.time_state {
            let cached = self.lookups.get(state).and_then(Value::as_f64);
            if let (Some(old), Some(new)) = (cached, value.as_f64()) {
                if new <= old {
                    debug!(state, old, new, "Stale time update dropped");
                    return false;
                }
            }
        }
        self.lookups.insert(state.to_string(), value);
        true
    }

    /// Current value of a lookup.
    pub fn lookup_value(&self, state: &str) -> Value {
        self.lookups.get(state).cloned().unwrap_or_default()
    }

    /// Current value of a plan variable.
    pub fn variable_value(&self, name: &str) -> Value {
        self.variables.get(name).cloned().unwrap_or_default()
    }

    /// Write a plan variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Return a plan variable to unknown.
    pub fn reset_variable(&mut self, name: &str) {
        self.variables.remove(name);
    }

    /// Queue a received message.
    pub fn receive_message(&mut self, message: Message) {
        self.messages_exhausted = false;
        self.inbox.push_back(message);
    }

    /// Mark the message source as drained.
    pub fn set_messages_exhausted(&mut self) {
        self.messages_exhausted = true;
    }

    /// Check if the message source reported it has nothing more.
    pub fn messages_exhausted(&self) -> bool {
        self.messages_exhausted
    }

    /// Received messages not yet accepted.
    pub fn pending_messages(&self) -> impl Iterator<Item = &Message> {
        self.inbox.iter()
    }

    /// Hold a message under a handle, removing it from the inbox if there.
    pub fn accept_message(&mut self, handle: impl Into<String>, message: Message) {
        if let Some(pos) = self.inbox.iter().position(|m| *m == message) {
            self.inbox.remove(pos);
        }
        self.accepted.insert(handle.into(), message);
    }

    /// Message held under a handle.
    pub fn accepted_message(&self, handle: &str) -> Option<&Message> {
        self.accepted.get(handle)
    }

    /// Drop a message handle. Returns whether it existed.
    pub fn release_message_handle(&mut self, handle: &str) -> bool {
        self.accepted.remove(handle).is_some()
    }
}

impl ExprContext for StateCache {
    fn lookup(&self, state: &str) -> Value {
        self.lookup_value(state)
    }

    fn variable(&self, name: &str) -> Value {
        self.variable_value(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_time_is_dropped() {
        let mut cache = StateCache::new("time");
        assert!(cache.update_lookup("time", Value::real(10.0)));
        assert!(!cache.update_lookup("time", Value::real(10.0)));
        assert!(!cache.update_lookup("time", Value::real(9.5)));
        assert!(cache.update_lookup("time", Value::real(10.5)));
        assert_eq!(cache.lookup("time").as_f64(), Some(10.5));

        assert!(cache.update_lookup("speed", Value::real(3.0)));
        assert!(cache.update_lookup("speed", Value::real(1.0)));
    }

    #[test]
    fn unchanged_lookup_is_not_an_update() {
        let mut cache = StateCache::new("time");
        assert!(!cache.update_lookup("door", Value::unknown()));
        assert!(cache.update_lookup("door", Value::bool(true)));
        assert!(!cache.update_lookup("door", Value::bool(true)));
        assert!(cache.update_lookup("door", Value::unknown()));
        assert!(cache.lookup("door").is_unknown());
    }

    #[test]
    fn unknown_until_set() {
        let mut cache = StateCache::new("time");
        assert!(cache.variable("x").is_unknown());
        cache.set_variable("x", Value::int(2));
        assert_eq!(cache.variable("x"), Value::int(2));
        cache.reset_variable("x");
        assert!(cache.variable("x").is_unknown());
    }

    #[test]
    fn message_handles() {
        let mut cache = StateCache::new("time");
        let message = Message::new("ground", "hello");
        cache.receive_message(message.clone());
        cache.set_messages_exhausted();
        assert!(cache.messages_exhausted());

        cache.accept_message("h1", message.clone());
        assert_eq!(cache.pending_messages().count(), 0);
        assert_eq!(cache.accepted_message("h1"), Some(&message));
        assert!(cache.release_message_handle("h1"));
        assert!(!cache.release_message_handle("h1"));
    }
}
