//! Recording documents
//!
//! The recorder stores a session as `{ "startTime": <ms>, "items": [...] }`.
//! This module reads that document (or a bare array of items) and hands the
//! items to the player. Writing recordings is the recorder's job.

use crate::error::Result;
use crate::types::Item;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Read;

/// A stored recording session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct Recording {
    /// Wall-clock time the capture started, in ms since the Unix epoch
    pub start_time: u64,

    /// Captured items, in capture order
    pub items: Vec<Item>,
}

impl Recording {
    /// Parse a recording from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(value))
    }

    /// Parse a recording from a reader
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let value: Value = serde_json::from_reader(reader)?;
        Ok(Self::from_value(value))
    }

    /// Normalize a parsed document
    ///
    /// Anything that is neither an object nor an array yields an empty
    /// recording. A positive `startTime` is truncated to whole milliseconds;
    /// a missing or non-positive one becomes 0. A missing or non-array
    /// `items` becomes empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self {
                start_time: 0,
                items: items.into_iter().map(Item::from).collect(),
            },
            Value::Object(mut map) => {
                let start_time = map
                    .get("startTime")
                    .and_then(|start| {
                        start
                            .as_u64()
                            .or_else(|| start.as_f64().filter(|ms| *ms > 0.0).map(|ms| ms as u64))
                    })
                    .unwrap_or_default();
                let items = match map.remove("items") {
                    Some(Value::Array(items)) => items.into_iter().map(Item::from).collect(),
                    _ => Vec::new(),
                };
                Self { start_time, items }
            }
            _ => Self::default(),
        }
    }

    /// Offset of the last valid item, in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.items
            .iter()
            .filter_map(|item| item.t)
            .max()
            .unwrap_or_default()
    }

    /// Number of items that would be reported as errors on playback
    pub fn malformed_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_well_formed()).count()
    }

    /// Distinct event names, sorted
    pub fn names(&self) -> BTreeSet<&str> {
        self.items.iter().filter_map(Item::name).collect()
    }

    /// Take the items for loading into a player
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

impl From<Value> for Recording {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
