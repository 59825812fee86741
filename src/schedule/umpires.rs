//! Canonical shape for the per-position umpire assignments of a schedule cell.
//!
//! Clients have sent this payload in many shapes over time: a JSON-encoded string, a sparse
//! object, bare ids, or slot objects using `umpire_id`/`id`/`ID` instead of `umpireId`.
//! [`normalize_umpires`] folds all of them into [`UmpireSlots`], which always holds the eight
//! positions and never carries an id that is not a strictly positive integer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Umpire positions of a game, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UmpirePosition {
    /// Home plate.
    #[serde(rename = "H")]
    HomePlate,
    /// Replay review.
    #[serde(rename = "R")]
    Replay,
    /// First base.
    #[serde(rename = "1B")]
    FirstBase,
    /// Second base.
    #[serde(rename = "2B")]
    SecondBase,
    /// Third base.
    #[serde(rename = "3B")]
    ThirdBase,
    /// Left-field line.
    #[serde(rename = "LF")]
    LeftFieldLine,
    /// Right-field line.
    #[serde(rename = "LR")]
    RightFieldLine,
    /// On-deck / clock.
    #[serde(rename = "OR")]
    OnDeck,
}

impl UmpirePosition {
    /// Every position, in display order.
    pub const ALL: [UmpirePosition; 8] = [
        UmpirePosition::HomePlate,
        UmpirePosition::Replay,
        UmpirePosition::FirstBase,
        UmpirePosition::SecondBase,
        UmpirePosition::ThirdBase,
        UmpirePosition::LeftFieldLine,
        UmpirePosition::RightFieldLine,
        UmpirePosition::OnDeck,
    ];

    /// Key used for this position in JSON payloads.
    pub fn key(self) -> &'static str {
        match self {
            UmpirePosition::HomePlate => "H",
            UmpirePosition::Replay => "R",
            UmpirePosition::FirstBase => "1B",
            UmpirePosition::SecondBase => "2B",
            UmpirePosition::ThirdBase => "3B",
            UmpirePosition::LeftFieldLine => "LF",
            UmpirePosition::RightFieldLine => "LR",
            UmpirePosition::OnDeck => "OR",
        }
    }
}

/// Keys that may carry the umpire id on a slot object, in lookup order.
const ID_ALIASES: [&str; 4] = ["umpireId", "umpire_id", "id", "ID"];
/// Keys owned by [`UmpireSlot`] itself and therefore never kept in `extra`.
const RESERVED_KEYS: [&str; 6] = ["umpireId", "umpire_id", "id", "ID", "name", "double"];

/// One position assignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UmpireSlot {
    /// Assigned umpire, `None` while the slot is unfilled.
    pub umpire_id: Option<i64>,
    /// Display name, informational only.
    #[serde(default)]
    pub name: String,
    /// Free-text "double" annotation.
    #[serde(default)]
    pub double: String,
    /// Any other key the client attached to the slot.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UmpireSlot {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(fields)) => {
                let raw_id = ID_ALIASES
                    .iter()
                    .filter_map(|alias| fields.get(*alias))
                    .find(|candidate| !candidate.is_null());
                let extra = fields
                    .iter()
                    .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();

                Self {
                    umpire_id: raw_id.and_then(coerce_umpire_id),
                    name: coerce_text(fields.get("name")),
                    double: coerce_text(fields.get("double")),
                    extra,
                }
            }
            Some(scalar @ (Value::Number(_) | Value::String(_))) => Self {
                umpire_id: coerce_umpire_id(scalar),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

/// The eight umpire slots of a cell, always complete and in display order.
///
/// Deserializing goes through [`normalize_umpires`], so stored rows written by older clients are
/// cleaned up on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct UmpireSlots(IndexMap<UmpirePosition, UmpireSlot>);

impl UmpireSlots {
    /// Slots with every position unfilled.
    pub fn empty() -> Self {
        Self(
            UmpirePosition::ALL
                .into_iter()
                .map(|position| (position, UmpireSlot::default()))
                .collect(),
        )
    }

    /// Slot for `position`.
    pub fn get(&self, position: UmpirePosition) -> &UmpireSlot {
        // every position is inserted at construction
        &self.0[&position]
    }

    /// Iterate over the positions in display order.
    pub fn iter(&self) -> impl Iterator<Item = (UmpirePosition, &UmpireSlot)> {
        self.0.iter().map(|(position, slot)| (*position, slot))
    }
}

impl Default for UmpireSlots {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for UmpireSlots {
    fn from(value: Value) -> Self {
        normalize_umpires(&value)
    }
}

/// Fold any supported umpire payload shape into the canonical eight slots. Never fails.
pub fn normalize_umpires(raw: &Value) -> UmpireSlots {
    let parsed;
    let fields = match raw {
        Value::Object(fields) => Some(fields),
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).ok();
            parsed.as_ref().and_then(Value::as_object)
        }
        _ => None,
    };

    let Some(fields) = fields else {
        return UmpireSlots::empty();
    };

    UmpireSlots(
        UmpirePosition::ALL
            .into_iter()
            .map(|position| {
                (
                    position,
                    UmpireSlot::from_value(fields.get(position.key())),
                )
            })
            .collect(),
    )
}

/// Same as [`normalize_umpires`] for an optional payload, logging cells that arrive without a
/// right-field-line umpire since that slot has historically been dropped by clients.
pub fn normalize_optional_umpires(raw: Option<&Value>, context: &str) -> UmpireSlots {
    let slots = raw.map(normalize_umpires).unwrap_or_default();
    if slots
        .get(UmpirePosition::RightFieldLine)
        .umpire_id
        .is_none()
    {
        debug!(context, "umpire payload has no LR assignment");
    }
    slots
}

/// Strictly positive integer, or `None`.
fn coerce_umpire_id(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };

    if number.is_finite() && number >= 1.0 && number.fract() == 0.0 && number <= i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn home_plate_id(raw: Value) -> Option<i64> {
        normalize_umpires(&json!({ "H": raw }))
            .get(UmpirePosition::HomePlate)
            .umpire_id
    }

    #[test]
    fn invalid_ids_become_null() {
        for raw in [json!("0"), json!(0), json!(-5), json!("abc"), Value::Null, json!(""), json!(2.5)] {
            assert_eq!(home_plate_id(raw.clone()), None, "{raw}");
        }
        let missing = normalize_umpires(&json!({}));
        assert_eq!(missing.get(UmpirePosition::HomePlate).umpire_id, None);
    }

    #[test]
    fn numeric_ids_are_kept() {
        assert_eq!(home_plate_id(json!("7")), Some(7));
        assert_eq!(home_plate_id(json!(7)), Some(7));
        assert_eq!(home_plate_id(json!({ "umpireId": " 12 " })), Some(12));
    }

    #[test]
    fn legacy_aliases_are_honoured_in_order() {
        assert_eq!(home_plate_id(json!({ "umpire_id": 3 })), Some(3));
        assert_eq!(home_plate_id(json!({ "id": "4" })), Some(4));
        assert_eq!(home_plate_id(json!({ "ID": 5 })), Some(5));
        assert_eq!(home_plate_id(json!({ "umpireId": null, "id": 6 })), Some(6));
        assert_eq!(home_plate_id(json!({ "umpireId": 0, "id": 6 })), None);
    }

    #[test]
    fn output_always_has_eight_positions_in_order() {
        let slots = normalize_umpires(&json!({ "OR": 9, "H": 1 }));
        let keys: Vec<&str> = slots.iter().map(|(position, _)| position.key()).collect();
        assert_eq!(keys, ["H", "R", "1B", "2B", "3B", "LF", "LR", "OR"]);
        assert_eq!(slots.iter().filter(|(_, slot)| slot.umpire_id.is_some()).count(), 2);
    }

    #[test]
    fn string_payload_is_parsed_and_garbage_is_empty() {
        let slots = normalize_umpires(&json!(r#"{"LR": {"umpireId": 11, "name": "Ana"}}"#));
        let lr = slots.get(UmpirePosition::RightFieldLine);
        assert_eq!(lr.umpire_id, Some(11));
        assert_eq!(lr.name, "Ana");

        assert_eq!(normalize_umpires(&json!("{not json")), UmpireSlots::empty());
        assert_eq!(normalize_umpires(&json!([1, 2, 3])), UmpireSlots::empty());
        assert_eq!(normalize_umpires(&json!(42)), UmpireSlots::empty());
    }

    #[test]
    fn slot_objects_keep_annotations_and_extra_keys() {
        let slots = normalize_umpires(&json!({
            "2B": { "ID": "8", "double": "x2", "note": "travel", "name": null }
        }));
        let slot = slots.get(UmpirePosition::SecondBase);
        assert_eq!(slot.umpire_id, Some(8));
        assert_eq!(slot.double, "x2");
        assert_eq!(slot.name, "");
        assert_eq!(slot.extra.get("note"), Some(&json!("travel")));
        assert!(!slot.extra.contains_key("ID"));
    }

    #[test]
    fn serde_round_trip_normalizes_stored_rows() {
        let stored = json!({ "H": { "umpireId": "0", "name": "x" }, "R": 2 });
        let slots: UmpireSlots = serde_json::from_value(stored).unwrap();
        assert_eq!(slots.get(UmpirePosition::HomePlate).umpire_id, None);
        assert_eq!(slots.get(UmpirePosition::Replay).umpire_id, Some(2));

        let encoded = serde_json::to_value(&slots).unwrap();
        assert_eq!(encoded["R"], json!({ "umpireId": 2, "name": "", "double": "" }));
    }
}
