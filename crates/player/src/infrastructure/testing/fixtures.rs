//! Simple test fixtures used across unit tests.

use serde_json::json;

use boardsync_protocol::{
    Chest, GameSnapshot, InfoResponse, MoveForm, PlayerSummary, RawBundle, RawState,
    StatusEnvelope, TimerInfo, VersionResponse,
};

pub const GAME_NAME: &str = "memory";

/// Chest with a four-card deck and one enum.
pub fn chest() -> Chest {
    serde_json::from_value(json!({
        "Decks": {
            "cards": [
                {"Type": "A"},
                {"Type": "B"},
                {"Type": "C"},
                {"Type": "D"}
            ]
        },
        "Enums": {
            "Color": ["Red", "Blue"]
        }
    }))
    .expect("fixture chest is valid")
}

/// Two-player state with a stack on the game, one stack per player and a
/// turn timer.
pub fn raw_state(version: i64) -> RawState {
    serde_json::from_value(json!({
        "Version": version,
        "Game": {
            "Round": version,
            "DrawStack": {"Deck": "cards", "Indexes": [0, -1, -2, 3], "IDs": ["c0", "", "", "c3"], "Size": 4},
            "TurnTimer": {"IsTimer": true, "ID": "turn"}
        },
        "Players": [
            {"Score": 0, "Hand": {"Deck": "cards", "Indexes": [1]}},
            {"Score": 0, "Hand": {"Deck": "cards", "Indexes": [2]}}
        ],
        "Components": {"cards": [null, {"Flipped": true}]},
        "Computed": {"Global": {"Leader": 0}, "Players": [{"Total": 1}, null]}
    }))
    .expect("fixture state is valid")
}

pub fn game_snapshot(version: i64) -> GameSnapshot {
    let mut game = GameSnapshot {
        name: GAME_NAME.to_string(),
        id: "g-1".to_string(),
        version,
        current_player_index: 0,
        finished: false,
        winners: Vec::new(),
        current_state: raw_state(version),
        active_timers: Default::default(),
    };
    game.active_timers
        .insert("turn".to_string(), TimerInfo::new(3_000));
    game
}

pub fn move_form() -> MoveForm {
    serde_json::from_value(json!({
        "Name": "Reveal Card",
        "HelpText": "Reveals a card",
        "Fields": [
            {"Name": "CardIndex", "Type": "Int", "DefaultValue": 0},
            {"Name": "Color", "Type": "Enum", "Enum": "Color"}
        ]
    }))
    .expect("fixture form is valid")
}

pub fn raw_bundle(version: i64, delay: u64) -> RawBundle {
    RawBundle {
        game: game_snapshot(version),
        forms: vec![move_form()],
        viewing_as_player: 0,
        delay,
    }
}

/// Successful info response showing `version` from player 0's seat.
pub fn info_response(version: i64) -> InfoResponse {
    InfoResponse {
        envelope: StatusEnvelope::success(),
        chest: Some(chest()),
        game: Some(game_snapshot(version)),
        forms: vec![move_form()],
        players: vec![
            PlayerSummary {
                name: "Ada".to_string(),
                ..PlayerSummary::default()
            },
            PlayerSummary {
                is_empty: true,
                ..PlayerSummary::default()
            },
        ],
        viewing_as_player: 0,
        has_empty_slots: true,
        game_open: true,
        game_visible: true,
        is_owner: false,
    }
}

/// Successful version response with one undelayed bundle per version.
pub fn version_response(versions: &[i64]) -> VersionResponse {
    VersionResponse {
        envelope: StatusEnvelope::success(),
        bundles: versions
            .iter()
            .map(|version| raw_bundle(*version, 0))
            .collect(),
    }
}
