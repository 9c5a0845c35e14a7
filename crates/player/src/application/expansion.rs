//! State expansion: compact wire state -> render-ready tree.
//!
//! Every function here is pure. Inputs are borrowed immutably and a new tree
//! is returned, so the same `RawState` and `Chest` can back any number of
//! expansions.
//!
//! Timers are handled in two steps. [`expand_state`] either overlays the live
//! timer values or leaves zeroed timer views ([`TimerMode::Skip`]); the
//! high-frequency countdown path then calls [`overlay_timers`] on an already
//! expanded state, which rebuilds only the objects that actually hold timers
//! and shares every other object with the input.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use boardsync_protocol::{
    Chest, PropertyMap, RawState, StackRef, StateValue, TimerInfos, TimerRef, GENERIC_SLOT,
};

/// Whether live timer values are merged during expansion.
#[derive(Debug, Clone, Copy)]
pub enum TimerMode<'a> {
    /// Leave timer views zeroed.
    Skip,
    /// Overlay `TimeLeft`/`originalTimeLeft` from these infos.
    Live(&'a TimerInfos),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpandedState {
    pub version: i64,
    pub game: Arc<ExpandedObject>,
    pub players: Vec<Arc<ExpandedObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed: Option<Value>,
}

/// The game or one player, with references dereferenced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandedObject {
    #[serde(flatten)]
    pub fields: BTreeMap<String, ExpandedValue>,
    /// Denormalized copy of the player's computed properties.
    #[serde(rename = "Computed", skip_serializing_if = "Option::is_none")]
    pub computed: Option<Value>,
}

impl ExpandedObject {
    pub fn stack(&self, key: &str) -> Option<&ExpandedStack> {
        match self.fields.get(key) {
            Some(ExpandedValue::Stack(stack)) => Some(stack),
            _ => None,
        }
    }

    pub fn timer(&self, key: &str) -> Option<&TimerView> {
        match self.fields.get(key) {
            Some(ExpandedValue::Timer(timer)) => Some(timer),
            _ => None,
        }
    }

    pub fn has_timers(&self) -> bool {
        self.fields
            .values()
            .any(|value| matches!(value, ExpandedValue::Timer(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExpandedValue {
    Plain(Value),
    Stack(ExpandedStack),
    Timer(TimerView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpandedStack {
    pub deck: String,
    pub game_name: String,
    /// One entry per slot; `None` is an empty slot.
    pub components: Vec<Option<ExpandedComponent>>,
    #[serde(flatten)]
    pub extra: PropertyMap,
}

/// A dereferenced component.
///
/// The generic placeholder (a component this viewer may not identify) is the
/// default value and serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpandedComponent {
    #[serde(flatten)]
    pub values: PropertyMap,
    #[serde(rename = "DynamicValues", skip_serializing_if = "Option::is_none")]
    pub dynamic_values: Option<Value>,
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Deck", skip_serializing_if = "Option::is_none")]
    pub deck: Option<String>,
    #[serde(rename = "GameName", skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
}

impl ExpandedComponent {
    pub fn generic() -> Self {
        Self::default()
    }

    pub fn is_generic(&self) -> bool {
        self.deck.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerView {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "TimeLeft")]
    pub time_left: i64,
    #[serde(rename = "originalTimeLeft")]
    pub original_time_left: i64,
    #[serde(flatten)]
    pub extra: PropertyMap,
}

impl TimerView {
    fn apply(&mut self, infos: &TimerInfos) {
        match infos.get(&self.id) {
            Some(info) => {
                let info = info.normalized();
                self.time_left = info.time_left;
                self.original_time_left = info.original_time_left;
            }
            None => {
                self.time_left = 0;
                self.original_time_left = 0;
            }
        }
    }
}

/// Expand a raw state against the chest.
pub fn expand_state(
    raw: &RawState,
    chest: &Chest,
    game_name: &str,
    timers: TimerMode<'_>,
) -> ExpandedState {
    let game = Arc::new(expand_object(raw, &raw.game, chest, game_name, timers));

    let players = raw
        .players
        .iter()
        .enumerate()
        .map(|(index, player)| {
            let mut object = expand_object(raw, player, chest, game_name, timers);
            object.computed = raw.computed_player(index).cloned();
            Arc::new(object)
        })
        .collect();

    let computed = raw
        .computed
        .as_ref()
        .map(|computed| computed.global.clone())
        .filter(|global| !global.is_null());

    ExpandedState {
        version: raw.version,
        game,
        players,
        computed,
    }
}

/// Refresh timer views with new live values, sharing every object that holds
/// no timer.
pub fn overlay_timers(state: &ExpandedState, timers: &TimerInfos) -> ExpandedState {
    ExpandedState {
        version: state.version,
        game: overlay_object(&state.game, timers),
        players: state
            .players
            .iter()
            .map(|player| overlay_object(player, timers))
            .collect(),
        computed: state.computed.clone(),
    }
}

fn overlay_object(object: &Arc<ExpandedObject>, timers: &TimerInfos) -> Arc<ExpandedObject> {
    if !object.has_timers() {
        return Arc::clone(object);
    }

    let mut updated = ExpandedObject::clone(object);
    for value in updated.fields.values_mut() {
        if let ExpandedValue::Timer(view) = value {
            view.apply(timers);
        }
    }
    Arc::new(updated)
}

fn expand_object(
    raw: &RawState,
    properties: &PropertyMap,
    chest: &Chest,
    game_name: &str,
    timers: TimerMode<'_>,
) -> ExpandedObject {
    let fields = properties
        .iter()
        .map(|(key, value)| {
            let expanded = match StateValue::classify(value) {
                StateValue::Stack(stack) => {
                    ExpandedValue::Stack(expand_stack(raw, &stack, chest, game_name))
                }
                StateValue::Timer(timer) => ExpandedValue::Timer(expand_timer(&timer, timers)),
                StateValue::Plain(value) => ExpandedValue::Plain(value.clone()),
            };
            (key.clone(), expanded)
        })
        .collect();

    ExpandedObject {
        fields,
        computed: None,
    }
}

/// Dereference one stack. Slot order and length are preserved.
pub fn expand_stack(
    raw: &RawState,
    stack: &StackRef,
    chest: &Chest,
    game_name: &str,
) -> ExpandedStack {
    if stack.has_mismatched_ids() {
        tracing::warn!(
            deck = %stack.deck,
            slots = stack.indexes.len(),
            "Stack IDs do not line up with indexes"
        );
    }

    let deck = chest.deck(&stack.deck);
    if deck.is_none() {
        tracing::warn!(deck = %stack.deck, "Deck missing from chest; stack expands to empty slots");
    }

    let components = stack
        .indexes
        .iter()
        .enumerate()
        .map(|(slot, &index)| {
            let deck = deck?;
            if index == GENERIC_SLOT {
                return Some(ExpandedComponent::generic());
            }
            // -1 and any other negative index is an empty slot.
            let position = usize::try_from(index).ok()?;
            let Some(template) = deck.get(position) else {
                tracing::warn!(deck = %stack.deck, index, "Stack index beyond deck size");
                return None;
            };
            Some(ExpandedComponent {
                values: template.clone(),
                dynamic_values: raw.dynamic_values(&stack.deck, position).cloned(),
                id: stack.id_at(slot).map(str::to_string),
                deck: Some(stack.deck.clone()),
                game_name: Some(game_name.to_string()),
            })
        })
        .collect();

    ExpandedStack {
        deck: stack.deck.clone(),
        game_name: game_name.to_string(),
        components,
        extra: stack.extra.clone(),
    }
}

fn expand_timer(timer: &TimerRef, mode: TimerMode<'_>) -> TimerView {
    let mut view = TimerView {
        id: timer.id.clone(),
        time_left: 0,
        original_time_left: 0,
        extra: timer.extra.clone(),
    };
    if let TimerMode::Live(infos) = mode {
        view.apply(infos);
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::fixtures::{chest, raw_state, GAME_NAME};
    use boardsync_protocol::TimerInfo;
    use serde_json::json;

    fn live_timers(time_left: i64) -> TimerInfos {
        let mut timers = TimerInfos::new();
        timers.insert("turn".to_string(), TimerInfo::new(time_left));
        timers
    }

    #[test]
    fn stack_expansion_preserves_slot_order_and_sentinels() {
        let state = expand_state(&raw_state(3), &chest(), GAME_NAME, TimerMode::Skip);
        let stack = state.game.stack("DrawStack").unwrap();

        assert_eq!(stack.components.len(), 4);

        let first = stack.components[0].as_ref().unwrap();
        assert_eq!(first.values.get("Type"), Some(&json!("A")));
        assert_eq!(first.id.as_deref(), Some("c0"));
        assert_eq!(first.deck.as_deref(), Some("cards"));
        assert_eq!(first.game_name.as_deref(), Some(GAME_NAME));

        assert!(stack.components[1].is_none());

        let generic = stack.components[2].as_ref().unwrap();
        assert!(generic.is_generic());
        assert_eq!(serde_json::to_value(generic).unwrap(), json!({}));

        let last = stack.components[3].as_ref().unwrap();
        assert_eq!(last.values.get("Type"), Some(&json!("D")));
        assert_eq!(last.id.as_deref(), Some("c3"));

        assert_eq!(stack.extra.get("Size"), Some(&json!(4)));
    }

    #[test]
    fn dynamic_values_are_attached_per_instance() {
        let state = expand_state(&raw_state(3), &chest(), GAME_NAME, TimerMode::Skip);

        let first_hand = state.players[0].stack("Hand").unwrap();
        let card = first_hand.components[0].as_ref().unwrap();
        assert_eq!(card.values.get("Type"), Some(&json!("B")));
        assert_eq!(card.dynamic_values, Some(json!({"Flipped": true})));

        let second_hand = state.players[1].stack("Hand").unwrap();
        assert_eq!(second_hand.components[0].as_ref().unwrap().dynamic_values, None);
    }

    #[test]
    fn missing_deck_yields_empty_slots() {
        let mut raw = raw_state(1);
        raw.game.insert(
            "Discard".to_string(),
            json!({"Deck": "tokens", "Indexes": [0, -2, 1]}),
        );

        let state = expand_state(&raw, &chest(), GAME_NAME, TimerMode::Skip);
        let discard = state.game.stack("Discard").unwrap();

        assert_eq!(discard.components, vec![None, None, None]);
    }

    #[test]
    fn out_of_range_index_is_an_empty_slot() {
        let mut raw = raw_state(1);
        raw.game.insert(
            "Overflow".to_string(),
            json!({"Deck": "cards", "Indexes": [9]}),
        );

        let state = expand_state(&raw, &chest(), GAME_NAME, TimerMode::Skip);
        assert_eq!(state.game.stack("Overflow").unwrap().components, vec![None]);
    }

    #[test]
    fn expansion_is_idempotent_and_leaves_inputs_untouched() {
        let raw = raw_state(4);
        let chest = chest();
        let raw_before = raw.clone();
        let chest_before = chest.clone();
        let timers = live_timers(2_000);

        let first = expand_state(&raw, &chest, GAME_NAME, TimerMode::Live(&timers));
        let second = expand_state(&raw, &chest, GAME_NAME, TimerMode::Live(&timers));

        assert_eq!(first, second);
        assert_eq!(raw, raw_before);
        assert_eq!(chest, chest_before);
    }

    #[test]
    fn skipped_timers_are_zeroed_but_otherwise_untouched() {
        let state = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Skip);
        let timer = state.game.timer("TurnTimer").unwrap();

        assert_eq!(timer.id, "turn");
        assert_eq!(timer.time_left, 0);
        assert_eq!(timer.original_time_left, 0);
        assert_eq!(timer.extra.get("IsTimer"), Some(&json!(true)));
    }

    #[test]
    fn live_timers_overlay_only_time_fields() {
        let skipped = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Skip);
        let timers = live_timers(1_200);
        let live = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Live(&timers));

        let before = skipped.game.timer("TurnTimer").unwrap();
        let after = live.game.timer("TurnTimer").unwrap();
        assert_eq!(after.time_left, 1_200);
        assert_eq!(after.original_time_left, 1_200);
        assert_eq!(after.id, before.id);
        assert_eq!(after.extra, before.extra);

        // Everything that is not a timer is identical.
        assert_eq!(skipped.players, live.players);
        assert_eq!(skipped.game.stack("DrawStack"), live.game.stack("DrawStack"));
    }

    #[test]
    fn missing_timer_info_yields_zeroed_timer() {
        let timers = TimerInfos::new();
        let state = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Live(&timers));
        assert_eq!(state.game.timer("TurnTimer").unwrap().time_left, 0);
    }

    #[test]
    fn overlay_shares_objects_without_timers() {
        let state = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Skip);
        let ticked = overlay_timers(&state, &live_timers(900));

        assert!(!Arc::ptr_eq(&state.game, &ticked.game));
        assert!(Arc::ptr_eq(&state.players[0], &ticked.players[0]));
        assert!(Arc::ptr_eq(&state.players[1], &ticked.players[1]));
        assert_eq!(ticked.game.timer("TurnTimer").unwrap().time_left, 900);
        assert_eq!(state.game.timer("TurnTimer").unwrap().time_left, 0);
    }

    #[test]
    fn players_receive_their_computed_properties() {
        let state = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Skip);

        assert_eq!(state.players[0].computed, Some(json!({"Total": 1})));
        assert_eq!(state.players[1].computed, None);
        assert_eq!(state.game.computed, None);
        assert_eq!(state.computed, Some(json!({"Leader": 0})));
    }

    #[test]
    fn expanded_state_serializes_render_ready_json() {
        let state = expand_state(&raw_state(2), &chest(), GAME_NAME, TimerMode::Skip);
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(value["Version"], json!(2));
        assert_eq!(value["Game"]["Round"], json!(2));
        assert_eq!(value["Game"]["DrawStack"]["Components"][1], json!(null));
        assert_eq!(value["Game"]["DrawStack"]["Components"][0]["Type"], json!("A"));
        assert_eq!(value["Players"][0]["Computed"], json!({"Total": 1}));
        assert_eq!(value["Game"]["TurnTimer"]["TimeLeft"], json!(0));
    }
}
