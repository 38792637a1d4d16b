//! Property-based tests for the event player
//!
//! Uses proptest to verify run invariants across many random item queues.
//! Each case drives its own paused current-thread runtime.

use proptest::prelude::*;
use reprise_playback::{EventPlayer, Item, PlayerConfig, PlayerEvent, Topic};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ===== Helpers =====

fn arbitrary_item() -> impl Strategy<Value = Item> {
    (
        proptest::option::weighted(0.9, 0u64..500), // t
        proptest::option::weighted(0.9, "[a-c]"),   // n
        0i64..1000,                                 // d
    )
        .prop_map(|(t, n, d)| Item {
            t,
            n,
            d: Some(json!(d)),
            ..Item::default()
        })
}

fn arbitrary_items() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(arbitrary_item(), 0..30)
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Play `items` to completion, returning each notification with its time
fn play_to_completion(items: Vec<Item>, config: PlayerConfig) -> (EventPlayer, Vec<(u64, PlayerEvent)>) {
    paused_runtime().block_on(async move {
        let player = EventPlayer::new(config);
        player.load(items).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let origin = Instant::now();
        player.subscribe(Topic::All, move |event| {
            sink.lock()
                .unwrap()
                .push((origin.elapsed().as_millis() as u64, event.clone()));
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        player.on_complete(move || {
            let _ = tx.send(());
        });

        player.start().unwrap();
        rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let log = log.lock().unwrap().clone();
        (player, log)
    })
}

// ===== Property Tests =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every run ends with exactly one complete and an empty queue
    #[test]
    fn run_completes_exactly_once(items in arbitrary_items()) {
        let (player, log) = play_to_completion(items, PlayerConfig::default());

        let completes = log.iter().filter(|(_, e)| *e == PlayerEvent::Complete).count();
        prop_assert_eq!(completes, 1);
        prop_assert_eq!(&log.last().unwrap().1, &PlayerEvent::Complete);
        prop_assert_eq!(player.queue_len(), 0);
        prop_assert!(!player.is_playing());
    }

    /// Property: every item is reported exactly once, in queue order, on the
    /// channel matching its shape
    #[test]
    fn every_item_reported_once_in_order(items in arbitrary_items()) {
        let (_player, log) = play_to_completion(items.clone(), PlayerConfig::default());

        let reported: Vec<Item> = log
            .iter()
            .filter_map(|(_, e)| match e {
                PlayerEvent::Event(item) | PlayerEvent::Error(item) => Some(item.clone()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(&reported, &items);

        let errors = log.iter().filter(|(_, e)| matches!(e, PlayerEvent::Error(_))).count();
        let malformed = items.iter().filter(|i| !i.is_well_formed()).count();
        prop_assert_eq!(errors, malformed);

        let named = log.iter().filter(|(_, e)| matches!(e, PlayerEvent::Named { .. })).count();
        prop_assert_eq!(named, items.len() - malformed);
    }

    /// Property: a timed item never fires before its offset without a cap
    #[test]
    fn timed_items_never_fire_early(items in arbitrary_items()) {
        let (_player, log) = play_to_completion(items, PlayerConfig::default());

        for (at, event) in &log {
            if let PlayerEvent::Event(item) | PlayerEvent::Error(item) = event {
                if let Some(t) = item.t {
                    prop_assert!(*at >= t, "item at {}ms fired at {}ms", t, at);
                }
            }
        }
    }

    /// Property: with a cap, no gap between consecutive timed emissions
    /// exceeds the cap
    #[test]
    fn capped_gaps_stay_within_cap(items in arbitrary_items(), cap in 0u64..20) {
        let (_player, log) = play_to_completion(items, PlayerConfig::with_max_delay(cap));

        let mut previous = 0u64;
        for (at, event) in &log {
            let timed = match event {
                PlayerEvent::Event(item) | PlayerEvent::Error(item) => item.t.is_some(),
                _ => false,
            };
            if timed {
                prop_assert!(at - previous <= cap + 2, "gap {}ms over cap {}ms", at - previous, cap);
                previous = *at;
            }
        }
    }

    /// Property: stopping after the k-th well-formed item leaves exactly the
    /// unplayed suffix
    #[test]
    fn stop_leaves_unplayed_suffix(items in arbitrary_items(), k in 0usize..30) {
        let well_formed: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_well_formed())
            .map(|(index, _)| index)
            .collect();
        prop_assume!(k < well_formed.len());
        let stop_index = well_formed[k];

        let pending = paused_runtime().block_on({
            let items = items.clone();
            async move {
                let player = EventPlayer::default();
                player.load(items).unwrap();

                let weak = player.downgrade();
                let seen = Arc::new(Mutex::new(0usize));
                player.on_event(move |_item| {
                    let mut seen = seen.lock().unwrap();
                    *seen += 1;
                    if *seen == k + 1 {
                        if let Some(player) = weak.upgrade() {
                            player.stop();
                        }
                    }
                });

                player.start().unwrap();
                tokio::time::sleep(Duration::from_millis(1_000)).await;
                assert!(!player.is_playing());
                player.pending_items()
            }
        });

        prop_assert_eq!(pending, items[stop_index + 1..].to_vec());
    }
}
