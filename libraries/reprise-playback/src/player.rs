//! Event player - the playback scheduler
//!
//! Replays a queue of recorded items at their recorded offsets, relative to
//! the moment playback started. One Tokio task acts as the single pending
//! timer: it sleeps until the head item is due, emits it, and schedules the
//! next one. Each run carries a generation number, and every step checks it
//! before touching the queue, so a `stop` issued from inside a listener ends
//! the run even while the current timer task is still on the stack.

use crate::{
    error::{PlaybackError, Result},
    events::{Listeners, PlayerEvent, SubscriptionId, Topic},
    types::{json_kind, parse_max_delay, Item, PlayerConfig, PlayerState},
};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Playback scheduler
///
/// Cloning an `EventPlayer` yields another handle to the same player. A run
/// in progress keeps the player alive until it completes or is stopped.
///
/// # Example
///
/// ```rust,no_run
/// use reprise_playback::{EventPlayer, Item, PlayerConfig};
/// use serde_json::json;
///
/// # async fn demo() -> reprise_playback::Result<()> {
/// let player = EventPlayer::new(PlayerConfig::default());
/// player.on_named("click", |payload| println!("click at {payload}"));
/// player.on_complete(|| println!("done"));
///
/// player.load(vec![
///     Item::new(10, "click", json!({"x": 4, "y": 2})),
///     Item::new(50, "click", json!({"x": 8, "y": 1})),
/// ])?;
/// player.start()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventPlayer {
    shared: Arc<Shared>,
}

/// Non-owning handle to an [`EventPlayer`]
///
/// Listeners that drive the player should capture one of these rather than
/// a full handle, otherwise the player and its listeners keep each other
/// alive.
#[derive(Clone)]
pub struct WeakEventPlayer {
    shared: Weak<Shared>,
}

impl WeakEventPlayer {
    /// Get a full handle back, if the player still exists
    pub fn upgrade(&self) -> Option<EventPlayer> {
        self.shared.upgrade().map(|shared| EventPlayer { shared })
    }
}

struct Shared {
    inner: Mutex<Inner>,
    listeners: Listeners,
}

struct Inner {
    /// `None` until the first `load`
    queue: Option<VecDeque<Item>>,
    max_delay: Option<Duration>,
    running: bool,
    play_started_at: Option<Instant>,
    generation: u64,
    pending_timer: Option<AbortHandle>,
}

/// Outcome of one pass of the dispatch loop
enum Step {
    Complete,
    Malformed(Item),
    Scheduled,
    Halted,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.running && self.generation == generation
    }

    fn halt(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            timer.abort();
        }
        self.running = false;
        self.play_started_at = None;
    }

    fn queue_len(&self) -> usize {
        self.queue.as_ref().map_or(0, VecDeque::len)
    }
}

impl EventPlayer {
    /// Create a player with no items loaded
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    queue: None,
                    max_delay: config.max_delay(),
                    running: false,
                    play_started_at: None,
                    generation: 0,
                    pending_timer: None,
                }),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Create a player with `items` already loaded
    pub fn with_items(items: Vec<Item>, config: PlayerConfig) -> Self {
        let player = Self::new(config);
        player.lock().queue = Some(items.into());
        player
    }

    /// Get a non-owning handle
    pub fn downgrade(&self) -> WeakEventPlayer {
        WeakEventPlayer {
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.lock()
    }

    // ===== Configuration =====

    /// Cap every wait at `max_delay_ms`, or restore recorded timing with `None`
    pub fn configure(&self, max_delay_ms: Option<u64>) {
        self.lock().max_delay = max_delay_ms.map(Duration::from_millis);
    }

    /// Configure the cap from a dynamically typed value
    ///
    /// See [`parse_max_delay`](crate::parse_max_delay) for the accepted forms.
    /// A rejected value leaves the current cap in place.
    pub fn configure_value(&self, max_delay: &Value) -> Result<()> {
        let max_delay_ms = parse_max_delay(max_delay)?;
        self.configure(max_delay_ms);
        Ok(())
    }

    /// Current delay cap
    pub fn max_delay(&self) -> Option<Duration> {
        self.lock().max_delay
    }

    // ===== Queue =====

    /// Replace the queue
    ///
    /// Items are not validated here; malformed items are reported when they
    /// reach the head of the queue during a run.
    pub fn load(&self, items: Vec<Item>) -> Result<()> {
        let mut inner = self.lock();
        if inner.running {
            return Err(PlaybackError::LoadWhilePlaying);
        }
        debug!("Loaded {} items", items.len());
        inner.queue = Some(items.into());
        Ok(())
    }

    /// Replace the queue from a JSON array of items
    pub fn load_json(&self, items: &Value) -> Result<()> {
        if self.is_playing() {
            return Err(PlaybackError::LoadWhilePlaying);
        }
        let Value::Array(values) = items else {
            return Err(PlaybackError::InvalidItems(json_kind(items).to_string()));
        };
        self.load(values.iter().cloned().map(Item::from).collect())
    }

    /// Stop any run and empty the queue
    pub fn clear(&self) {
        self.stop();
        self.lock().queue = Some(VecDeque::new());
    }

    /// Whether a queue has been loaded
    pub fn is_loaded(&self) -> bool {
        self.lock().queue.is_some()
    }

    /// Number of items not yet played
    pub fn queue_len(&self) -> usize {
        self.lock().queue_len()
    }

    /// The items not yet played, in order
    pub fn pending_items(&self) -> Vec<Item> {
        self.lock()
            .queue
            .as_ref()
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    // ===== Playback control =====

    /// Start a run
    ///
    /// Does nothing if a run is already in progress. Items that lack an
    /// offset, and the completion of an empty queue, are reported before
    /// this returns.
    pub fn start(&self) -> Result<()> {
        let generation = {
            let mut inner = self.lock();
            if inner.queue.is_none() {
                return Err(PlaybackError::NotLoaded);
            }
            if inner.running {
                return Ok(());
            }
            if Handle::try_current().is_err() {
                return Err(PlaybackError::NoRuntime);
            }
            if !timers_enabled() {
                return Err(PlaybackError::TimersDisabled);
            }

            inner.running = true;
            inner.play_started_at = Some(Instant::now());
            inner.generation += 1;
            info!(
                "Starting playback of {} items (run {})",
                inner.queue_len(),
                inner.generation
            );
            inner.generation
        };

        Shared::advance(&self.shared, generation);
        Ok(())
    }

    /// Halt the run, keeping unplayed items for a later `start`
    ///
    /// Safe to call when idle and from inside a listener.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.running {
            info!("Playback stopped with {} items remaining", inner.queue_len());
        }
        inner.halt();
    }

    /// Current state
    pub fn state(&self) -> PlayerState {
        if self.is_playing() {
            PlayerState::Running
        } else {
            PlayerState::Idle
        }
    }

    /// Whether a run is in progress
    pub fn is_playing(&self) -> bool {
        self.lock().running
    }

    // ===== Subscriptions =====

    /// Register a listener for `topic`
    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> SubscriptionId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(topic, Arc::new(listener))
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.listeners.unsubscribe(id)
    }

    /// Listen to every well-formed item
    pub fn on_event<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Item) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Event, move |event| {
            if let PlayerEvent::Event(item) = event {
                listener(item);
            }
        })
    }

    /// Listen to the payloads of items named `name`
    pub fn on_named<F>(&self, name: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Named(name.into()), move |event| {
            if let PlayerEvent::Named { payload, .. } = event {
                listener(payload);
            }
        })
    }

    /// Listen to malformed items
    pub fn on_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Item) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Error, move |event| {
            if let PlayerEvent::Error(item) = event {
                listener(item);
            }
        })
    }

    /// Listen for the end of each run
    pub fn on_complete<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Topic::Complete, move |_event| listener())
    }
}

impl Default for EventPlayer {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

impl fmt::Debug for EventPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("EventPlayer")
            .field("running", &inner.running)
            .field("queue_len", &inner.queue_len())
            .field("max_delay", &inner.max_delay)
            .field("generation", &inner.generation)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlayerEvent) {
        trace!("Emitting {:?}", event);
        self.listeners.emit(&event.topic(), &event);
    }

    /// Dispatch loop: drain malformed heads, then arm the timer for the next
    /// item or finish the run
    fn advance(shared: &Arc<Shared>, generation: u64) {
        loop {
            match Self::step(shared, generation) {
                Step::Complete => {
                    info!("Playback complete (run {})", generation);
                    shared.emit(PlayerEvent::Complete);
                    return;
                }
                Step::Malformed(item) => {
                    warn!("Item without a valid offset: {:?}", item);
                    shared.emit(PlayerEvent::Error(item));
                }
                Step::Scheduled | Step::Halted => return,
            }
        }
    }

    fn step(shared: &Arc<Shared>, generation: u64) -> Step {
        let mut guard = shared.lock();
        let inner = &mut *guard;
        if !inner.is_current(generation) {
            return Step::Halted;
        }

        let head_offset = match inner.queue.as_ref().and_then(VecDeque::front) {
            None => {
                inner.halt();
                return Step::Complete;
            }
            Some(head) => head.offset(),
        };

        let Some(offset) = head_offset else {
            return inner
                .queue
                .as_mut()
                .and_then(VecDeque::pop_front)
                .map_or(Step::Halted, Step::Malformed);
        };

        let elapsed = inner
            .play_started_at
            .map_or(Duration::ZERO, |started| started.elapsed());
        let wait = offset.saturating_sub(elapsed);
        let delay = inner.max_delay.map_or(wait, |cap| wait.min(cap));
        debug!(
            "Next item due at {}ms, firing in {}ms",
            offset.as_millis(),
            delay.as_millis()
        );

        let sleep = tokio::time::sleep(delay);
        let timer_shared = Arc::clone(shared);
        let timer = tokio::spawn(async move {
            sleep.await;
            Shared::fire(&timer_shared, generation);
        });
        inner.pending_timer = Some(timer.abort_handle());
        Step::Scheduled
    }

    /// Timer callback: consume the head item, notify, continue the loop
    fn fire(shared: &Arc<Shared>, generation: u64) {
        let item = {
            let mut inner = shared.lock();
            if !inner.is_current(generation) {
                return;
            }
            inner.pending_timer = None;
            inner.queue.as_mut().and_then(VecDeque::pop_front)
        };

        if let Some(item) = item {
            match item.n.clone() {
                None => {
                    warn!("Item without a name: {:?}", item);
                    shared.emit(PlayerEvent::Error(item));
                }
                Some(name) => {
                    let payload = item.payload();
                    shared.emit(PlayerEvent::Event(item));
                    shared.emit(PlayerEvent::Named { name, payload });
                }
            }
        }

        Self::advance(shared, generation);
    }
}

/// Whether the current runtime has a time driver
///
/// Tokio offers no query for this; creating a `Sleep` panics when the driver
/// is missing, so one is created under `catch_unwind`.
fn timers_enabled() -> bool {
    std::panic::catch_unwind(|| drop(tokio::time::sleep(Duration::ZERO))).is_ok()
}
