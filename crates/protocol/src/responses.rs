//! Response bodies returned by the game server.
//!
//! Every response carries a `Status`. A non-success status inside an HTTP 200
//! is an application-level rejection (for example an illegal move) and comes
//! with a technical `Error` and an optional `FriendlyError` meant for users.

use serde::{Deserialize, Serialize};

use crate::chest::Chest;
use crate::forms::MoveForm;
use crate::state::GameSnapshot;

// =============================================================================
// Status Envelope
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Failure,

    /// Forward-compatibility fallback for newer variants.
    #[serde(other)]
    Unknown,
}

/// Status fields shared by every response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusEnvelope {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_error: Option<String>,
}

impl StatusEnvelope {
    pub fn success() -> Self {
        Self {
            status: ResponseStatus::Success,
            error: None,
            friendly_error: None,
        }
    }

    pub fn failure(technical: impl Into<String>, friendly: Option<String>) -> Self {
        Self {
            status: ResponseStatus::Failure,
            error: Some(technical.into()),
            friendly_error: friendly,
        }
    }

    /// The rejection carried by this envelope, or `None` on success.
    pub fn rejection(&self) -> Option<Rejection> {
        if self.status == ResponseStatus::Success {
            return None;
        }
        let technical = self
            .error
            .clone()
            .unwrap_or_else(|| format!("server returned status {:?}", self.status));
        let friendly = self
            .friendly_error
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| "The server could not complete that request.".to_string());
        Some(Rejection {
            friendly,
            technical,
        })
    }
}

/// Application-level rejection reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub friendly: String,
    pub technical: String,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.friendly, self.technical)
    }
}

// =============================================================================
// Info
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_empty: bool,
    #[serde(default)]
    pub is_agent: bool,
}

/// `GET info` body: everything needed to install a game view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InfoResponse {
    #[serde(flatten)]
    pub envelope: StatusEnvelope,
    #[serde(default)]
    pub chest: Option<Chest>,
    #[serde(default)]
    pub game: Option<GameSnapshot>,
    #[serde(default)]
    pub forms: Vec<MoveForm>,
    #[serde(default)]
    pub players: Vec<PlayerSummary>,
    #[serde(default)]
    pub viewing_as_player: i64,
    #[serde(default)]
    pub has_empty_slots: bool,
    #[serde(default)]
    pub game_open: bool,
    #[serde(default)]
    pub game_visible: bool,
    #[serde(default)]
    pub is_owner: bool,
}

// =============================================================================
// Version
// =============================================================================

/// One state transition as delivered by the version endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawBundle {
    pub game: GameSnapshot,
    #[serde(default)]
    pub forms: Vec<MoveForm>,
    #[serde(default)]
    pub viewing_as_player: i64,
    /// Milliseconds to wait before showing this state.
    #[serde(default)]
    pub delay: u64,
}

/// `GET version/<target>` body: every bundle after the `from` cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionResponse {
    #[serde(flatten)]
    pub envelope: StatusEnvelope,
    #[serde(default)]
    pub bundles: Vec<RawBundle>,
}

// =============================================================================
// Move
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveResponse {
    #[serde(flatten)]
    pub envelope: StatusEnvelope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_status_yields_rejection_with_friendly_fallback() {
        let body: MoveResponse = serde_json::from_value(json!({
            "Status": "Failure",
            "Error": "move not legal: not your turn"
        }))
        .unwrap();

        let rejection = body.envelope.rejection().unwrap();
        assert_eq!(rejection.technical, "move not legal: not your turn");
        assert_eq!(
            rejection.friendly,
            "The server could not complete that request."
        );
    }

    #[test]
    fn success_status_has_no_rejection() {
        let body: VersionResponse =
            serde_json::from_value(json!({"Status": "Success", "Bundles": []})).unwrap();
        assert!(body.envelope.rejection().is_none());
        assert!(body.bundles.is_empty());
    }

    #[test]
    fn unknown_status_is_treated_as_rejection() {
        let body: MoveResponse = serde_json::from_value(json!({
            "Status": "Maintenance",
            "FriendlyError": "Back soon"
        }))
        .unwrap();

        assert_eq!(body.envelope.status, ResponseStatus::Unknown);
        assert_eq!(body.envelope.rejection().unwrap().friendly, "Back soon");
    }

    #[test]
    fn info_failure_parses_without_game_or_chest() {
        let body: InfoResponse = serde_json::from_value(json!({
            "Status": "Failure",
            "Error": "no such game"
        }))
        .unwrap();
        assert!(body.game.is_none());
        assert!(body.chest.is_none());
        assert!(body.envelope.rejection().is_some());
    }
}
