//! Playback Events
//!
//! Typed notifications emitted by the event player:
//! - `Event` for every well-formed item, carrying the full item
//! - `Named` on the item's own channel, carrying only its payload
//! - `Error` for every malformed item, carrying the raw item
//! - `Complete` once per run, when the queue drains

use crate::types::Item;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// Notifications emitted by the event player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// A well-formed item fired
    Event(Item),

    /// A well-formed item fired, on its own named channel
    Named {
        /// The item's `n`
        name: String,
        /// The item's `d`
        payload: Value,
    },

    /// A malformed item was consumed
    Error(Item),

    /// The queue drained while running
    Complete,
}

impl PlayerEvent {
    /// The topic this notification is published under
    pub fn topic(&self) -> Topic {
        match self {
            PlayerEvent::Event(_) => Topic::Event,
            PlayerEvent::Named { name, .. } => Topic::Named(name.clone()),
            PlayerEvent::Error(_) => Topic::Error,
            PlayerEvent::Complete => Topic::Complete,
        }
    }
}

/// What a listener subscribes to
///
/// Named channels live in their own namespace, so an item named `"error"`
/// only reaches `Topic::Named("error")` listeners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Every well-formed item
    Event,

    /// Items with this name
    Named(String),

    /// Malformed items
    Error,

    /// End of a run
    Complete,

    /// Every notification
    All,
}

impl Topic {
    /// Shorthand for a named channel
    pub fn named(name: impl Into<String>) -> Self {
        Topic::Named(name.into())
    }

    fn matches(&self, topic: &Topic) -> bool {
        matches!(self, Topic::All) || self == topic
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Listener callback
pub type Listener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Subscriber registry
///
/// The registry lock is released before listeners run, so a listener may
/// subscribe, unsubscribe, or drive the player while being notified.
#[derive(Default)]
pub(crate) struct Listeners {
    registry: Mutex<Registry>,
}

impl Listeners {
    pub(crate) fn subscribe(&self, topic: Topic, listener: Listener) -> SubscriptionId {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscriptions.push(Subscription {
            id,
            topic,
            listener,
        });
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.subscriptions.len();
        registry.subscriptions.retain(|sub| sub.id != id);
        registry.subscriptions.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .len()
    }

    /// Deliver `event` to every listener subscribed to `topic`, in
    /// subscription order
    pub(crate) fn emit(&self, topic: &Topic, event: &PlayerEvent) {
        let targets: Vec<Listener> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .subscriptions
                .iter()
                .filter(|sub| sub.topic.matches(topic))
                .map(|sub| Arc::clone(&sub.listener))
                .collect()
        };

        for listener in targets {
            listener(event);
        }
    }
}
