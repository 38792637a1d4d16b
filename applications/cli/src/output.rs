//! Line formatting for replayed notifications

use crate::config::OutputSettings;
use reprise_playback::{PlayerEvent, Recording};
use std::fmt::Write;

/// Format one notification, or `None` if the settings hide it
///
/// Lines look like `    120ms  click  {"x":4}`.
pub fn format_event(elapsed_ms: u128, event: &PlayerEvent, settings: &OutputSettings) -> Option<String> {
    let (kind, detail) = match event {
        PlayerEvent::Event(item) => {
            if !settings.show_events {
                return None;
            }
            ("event", serde_json::to_string(item).ok())
        }
        PlayerEvent::Named { name, payload } => {
            let payload = settings
                .payloads
                .then(|| payload.to_string());
            (name.as_str(), payload)
        }
        PlayerEvent::Error(item) => ("error", serde_json::to_string(item).ok()),
        PlayerEvent::Complete => ("complete", None),
    };

    let mut line = format!("{:>7}ms  {}", elapsed_ms, kind);
    if let Some(detail) = detail {
        let _ = write!(line, "  {}", detail);
    }
    Some(line)
}

/// Summary printed by `reprise inspect`
pub fn format_summary(recording: &Recording) -> String {
    let started = i64::try_from(recording.start_time)
        .ok()
        .filter(|ms| *ms > 0)
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339());
    let names: Vec<&str> = recording.names().into_iter().collect();

    let mut summary = String::new();
    let _ = writeln!(summary, "Started:   {}", started);
    let _ = writeln!(summary, "Duration:  {}ms", recording.duration_ms());
    let _ = writeln!(summary, "Items:     {}", recording.items.len());
    let _ = writeln!(summary, "Malformed: {}", recording.malformed_count());
    let _ = write!(summary, "Names:     {}", names.join(", "));
    summary
}
