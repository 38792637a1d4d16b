//! Reprise - Event Playback
//!
//! Replays recorded event streams with their original relative timing.
//!
//! This crate provides:
//! - Playback scheduler with a single pending timer
//! - Optional cap on every wait (fast-forward through idle gaps)
//! - Typed notifications (`event`, per-name channels, `error`, `complete`)
//! - Lenient item decoding; malformed items are reported, never stall a run
//! - Reader for the recorder's stored `{startTime, items}` document
//!
//! # Architecture
//!
//! `reprise-playback` only consumes recordings:
//! - No capture or item authoring
//! - No persistence; any source producing the item shape works
//! - Timers run on the caller's Tokio runtime
//!
//! # Example
//!
//! ```rust,no_run
//! use reprise_playback::{EventPlayer, PlayerConfig, PlayerEvent, Recording, Topic};
//!
//! # async fn demo() -> reprise_playback::Result<()> {
//! let recording = Recording::from_json_str(
//!     r#"{"startTime": 0, "items": [{"n": "a", "d": 1, "t": 10}, {"n": "b", "d": 2, "t": 50}]}"#,
//! )?;
//!
//! // Never wait more than 5ms between items
//! let player = EventPlayer::new(PlayerConfig::with_max_delay(5));
//! player.subscribe(Topic::All, |event| match event {
//!     PlayerEvent::Named { name, payload } => println!("{name}: {payload}"),
//!     PlayerEvent::Error(item) => eprintln!("malformed: {item:?}"),
//!     _ => {}
//! });
//!
//! player.load(recording.into_items())?;
//! player.start()?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod events;
mod player;
mod recording;
pub mod types;

// Public exports
pub use error::{PlaybackError, Result};
pub use events::{PlayerEvent, SubscriptionId, Topic};
pub use player::{EventPlayer, WeakEventPlayer};
pub use recording::Recording;
pub use types::{parse_max_delay, Item, PlayerConfig, PlayerState};
