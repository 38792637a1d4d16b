//! Core types for event playback

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// One recorded event
///
/// Field names match the compact form the recorder stores (`t`, `n`, `d`).
/// Validity is checked lazily when the item reaches the head of the queue,
/// so an item with a missing offset or name is still a valid `Item` value.
///
/// Keys the player does not understand, and `t`/`n` values of the wrong
/// type, are kept in `extra` so that the item serializes back to the object
/// it was decoded from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct Item {
    /// Milliseconds since the start of the original capture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<u64>,

    /// Event name to notify under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Opaque payload; `None` when the item had no `d` key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,

    /// Everything else from the source object
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Create a well-formed item
    pub fn new(t: u64, n: impl Into<String>, d: impl Into<Value>) -> Self {
        Self {
            t: Some(t),
            n: Some(n.into()),
            d: Some(d.into()),
            extra: Map::new(),
        }
    }

    /// Offset as a duration, if the item has one
    pub fn offset(&self) -> Option<Duration> {
        self.t.map(Duration::from_millis)
    }

    /// Event name, if the item has one
    pub fn name(&self) -> Option<&str> {
        self.n.as_deref()
    }

    /// Payload delivered on the item's named channel (`null` when absent)
    pub fn payload(&self) -> Value {
        self.d.clone().unwrap_or(Value::Null)
    }

    /// Whether the item can be emitted normally
    pub fn is_well_formed(&self) -> bool {
        self.t.is_some() && self.n.is_some()
    }
}

/// Lenient decoding: a `t` that is not a non-negative integer and an `n` that
/// is not a string both count as missing, and stay in `extra` as received.
/// Non-object values decode as an empty item.
impl From<Value> for Item {
    fn from(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };

        let t = match map.remove("t") {
            Some(raw) => match raw.as_u64() {
                Some(ms) => Some(ms),
                None => {
                    map.insert("t".to_string(), raw);
                    None
                }
            },
            None => None,
        };
        let n = match map.remove("n") {
            Some(Value::String(name)) => Some(name),
            Some(raw) => {
                map.insert("n".to_string(), raw);
                None
            }
            None => None,
        };
        let d = map.remove("d");

        Self {
            t,
            n,
            d,
            extra: map,
        }
    }
}

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// No run in progress
    Idle,

    /// A run is in progress
    Running,
}

/// Configuration for the event player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Upper bound on any single wait, in milliseconds (default: none)
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl PlayerConfig {
    /// Config with a delay cap
    pub fn with_max_delay(max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms: Some(max_delay_ms),
        }
    }

    /// The cap as a duration
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay_ms.map(Duration::from_millis)
    }
}

/// Interpret a dynamically typed delay cap
///
/// Numbers are accepted; negative numbers mean "no cap" and fractions are
/// truncated. `null` means "no cap". Anything else is rejected.
pub fn parse_max_delay(value: &Value) -> Result<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(ms) = number.as_u64() {
                Ok(Some(ms))
            } else {
                match number.as_f64() {
                    Some(ms) if ms >= 0.0 => Ok(Some(ms as u64)),
                    _ => Ok(None),
                }
            }
        }
        other => Err(PlaybackError::InvalidMaxDelay(json_kind(other).to_string())),
    }
}

/// Short name of a JSON value's type, for error messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_decodes_compact_form() {
        let item: Item = serde_json::from_value(json!({"n": "click", "d": {"x": 1}, "t": 10}))
            .unwrap();
        assert_eq!(item, Item::new(10, "click", json!({"x": 1})));
        assert!(item.is_well_formed());
        assert_eq!(item.offset(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_item_invalid_fields_decode_as_missing() {
        let item: Item =
            serde_json::from_value(json!({"n": 42, "t": "soon", "d": "payload"})).unwrap();
        assert_eq!(item.t, None);
        assert_eq!(item.n, None);
        assert_eq!(item.d, Some(json!("payload")));
        assert_eq!(item.extra.get("t"), Some(&json!("soon")));
        assert_eq!(item.extra.get("n"), Some(&json!(42)));

        let negative: Item = serde_json::from_value(json!({"n": "a", "t": -5})).unwrap();
        assert_eq!(negative.t, None);
        assert_eq!(negative.d, None);
        assert_eq!(negative.payload(), Value::Null);

        let scalar: Item = serde_json::from_value(json!(7)).unwrap();
        assert!(!scalar.is_well_formed());
    }

    #[test]
    fn test_item_serializes_back_to_source_object() {
        for source in [
            json!({"not": "foo", "properly": {"bar": "biz"}, "formatted": 20}),
            json!({"n": "a", "t": "soon", "d": 1}),
            json!({"n": "foo", "extra": {"k": [1, 2]}, "t": 20}),
            json!({"n": "a", "t": 1, "d": null}),
            json!({"t": 1.5, "n": null}),
        ] {
            let item = Item::from(source.clone());
            assert_eq!(serde_json::to_value(&item).unwrap(), source);
        }
    }

    #[test]
    fn test_item_serializes_without_missing_fields() {
        let item = Item {
            n: Some("a".to_string()),
            d: Some(json!(1)),
            ..Item::default()
        };
        assert_eq!(serde_json::to_value(&item).unwrap(), json!({"n": "a", "d": 1}));
    }

    #[test]
    fn test_parse_max_delay() {
        assert_eq!(parse_max_delay(&json!(100)).unwrap(), Some(100));
        assert_eq!(parse_max_delay(&json!(0)).unwrap(), Some(0));
        assert_eq!(parse_max_delay(&json!(12.9)).unwrap(), Some(12));
        assert_eq!(parse_max_delay(&json!(-1)).unwrap(), None);
        assert_eq!(parse_max_delay(&Value::Null).unwrap(), None);

        for bad in [json!(true), json!("100"), json!([1]), json!({"ms": 1})] {
            assert!(matches!(
                parse_max_delay(&bad),
                Err(PlaybackError::InvalidMaxDelay(_))
            ));
        }
    }

    #[test]
    fn test_player_config_defaults_to_no_cap() {
        let config: PlayerConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.max_delay(), None);
        assert_eq!(
            PlayerConfig::with_max_delay(5).max_delay(),
            Some(Duration::from_millis(5))
        );
    }
}
