//! Compact game state as sent by the server.
//!
//! A [`RawState`] is a flat mapping of property name to value for the game and
//! for each player. Some of those values are references that the client has to
//! dereference before rendering: a stack (`{"Deck": .., "Indexes": [..]}`) or a
//! timer (`{"IsTimer": true, "ID": ..}`). [`StateValue::classify`] tells them
//! apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Index sentinel for an empty stack slot.
pub const EMPTY_SLOT: i64 = -1;

/// Index sentinel for a component whose identity is hidden from this viewer.
pub const GENERIC_SLOT: i64 = -2;

/// Flat property bag for the game or one player.
pub type PropertyMap = Map<String, Value>;

/// Live timer values keyed by timer ID.
pub type TimerInfos = BTreeMap<String, TimerInfo>;

/// Server-authoritative snapshot of one state version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawState {
    pub version: i64,
    #[serde(default)]
    pub game: PropertyMap,
    #[serde(default)]
    pub players: Vec<PropertyMap>,
    /// Per-instance dynamic values, deck name -> values indexed like the deck.
    #[serde(default)]
    pub components: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<ComputedState>,
}

impl RawState {
    /// Dynamic values of one component instance, if the server sent any.
    pub fn dynamic_values(&self, deck: &str, index: usize) -> Option<&Value> {
        self.components
            .get(deck)
            .and_then(|values| values.get(index))
            .filter(|value| !value.is_null())
    }

    /// Computed properties for the player at `index`.
    pub fn computed_player(&self, index: usize) -> Option<&Value> {
        self.computed
            .as_ref()
            .and_then(|computed| computed.players.get(index))
            .filter(|value| !value.is_null())
    }
}

/// Properties the server derives from the state for render convenience.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputedState {
    #[serde(default)]
    pub global: Value,
    #[serde(default)]
    pub players: Vec<Value>,
}

/// Game object wrapping the current state, as returned by info and version
/// endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameSnapshot {
    pub name: String,
    pub id: String,
    pub version: i64,
    #[serde(default)]
    pub current_player_index: i64,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub winners: Vec<i64>,
    pub current_state: RawState,
    #[serde(default)]
    pub active_timers: TimerInfos,
}

/// Live countdown values for one timer, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerInfo {
    #[serde(rename = "TimeLeft", default)]
    pub time_left: i64,
    #[serde(rename = "originalTimeLeft", default)]
    pub original_time_left: i64,
}

impl TimerInfo {
    pub fn new(time_left: i64) -> Self {
        Self {
            time_left,
            original_time_left: time_left,
        }
    }

    /// `originalTimeLeft` falls back to the first `TimeLeft` seen.
    pub fn normalized(self) -> Self {
        if self.original_time_left > 0 {
            self
        } else {
            Self {
                original_time_left: self.time_left,
                ..self
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.time_left > 0
    }
}

/// Compact reference to an ordered collection of components.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRef {
    pub deck: String,
    pub indexes: Vec<i64>,
    pub ids: Option<Vec<Option<String>>>,
    /// Every other stack property, passed through untouched.
    pub extra: PropertyMap,
}

/// Compact reference to a server-side countdown.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRef {
    pub id: String,
    /// Every other timer property, passed through untouched.
    pub extra: PropertyMap,
}

/// A property value after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue<'a> {
    Stack(StackRef),
    Timer(TimerRef),
    Plain(&'a Value),
}

impl<'a> StateValue<'a> {
    /// Classify a property value: anything carrying `Deck` is a stack,
    /// anything carrying `IsTimer: true` is a timer, the rest is plain data.
    pub fn classify(value: &'a Value) -> Self {
        let Some(object) = value.as_object() else {
            return StateValue::Plain(value);
        };

        if let Some(deck) = object.get("Deck").and_then(Value::as_str) {
            return StateValue::Stack(StackRef::from_object(deck, object));
        }

        if object.get("IsTimer").and_then(Value::as_bool) == Some(true) {
            return StateValue::Timer(TimerRef::from_object(object));
        }

        StateValue::Plain(value)
    }
}

impl StackRef {
    fn from_object(deck: &str, object: &PropertyMap) -> Self {
        // Malformed indexes degrade to empty slots rather than failing the state.
        let indexes = object
            .get("Indexes")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| item.as_i64().unwrap_or(EMPTY_SLOT))
                    .collect()
            })
            .unwrap_or_default();

        let ids = object.get("IDs").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .map(|item| id_string(item).filter(|id| !id.is_empty()))
                .collect()
        });

        let extra = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "Deck" | "Indexes" | "IDs"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            deck: deck.to_string(),
            indexes,
            ids,
            extra,
        }
    }

    /// Stable per-slot ID, when the server sent one for `slot`.
    pub fn id_at(&self, slot: usize) -> Option<&str> {
        self.ids
            .as_ref()
            .and_then(|ids| ids.get(slot))
            .and_then(|id| id.as_deref())
    }

    /// True when IDs are present but do not line up with the indexes.
    pub fn has_mismatched_ids(&self) -> bool {
        self.ids
            .as_ref()
            .is_some_and(|ids| ids.len() != self.indexes.len())
    }
}

impl TimerRef {
    fn from_object(object: &PropertyMap) -> Self {
        let id = object.get("ID").and_then(id_string).unwrap_or_default();
        let extra = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "ID" | "TimeLeft" | "originalTimeLeft"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { id, extra }
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
