//! Request shapes and endpoint paths.
//!
//! Paths are relative to the game's base URL
//! (`<server>/api/game/<game_name>/<game_id>/`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// `GET info` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoQuery {
    pub player: i64,
    pub admin: bool,
    /// Last version the client already holds; lets the server skip work.
    pub from: i64,
}

impl InfoQuery {
    pub fn path(&self) -> String {
        format!(
            "info?player={}&admin={}&from={}",
            self.player,
            flag(self.admin),
            self.from
        )
    }
}

/// `GET version/<target>` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionQuery {
    pub target: i64,
    pub player: i64,
    pub admin: bool,
    /// Ask the server to view as whoever the current player is.
    pub auto_current_player: bool,
    /// Watermark: the server returns every bundle after this version.
    pub from: i64,
}

impl VersionQuery {
    pub fn path(&self) -> String {
        format!(
            "version/{}?player={}&admin={}&current={}&from={}",
            self.target,
            self.player,
            flag(self.admin),
            flag(self.auto_current_player),
            self.from
        )
    }
}

/// `POST move` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveRequest {
    pub move_type: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub player: i64,
    pub admin: bool,
}

impl MoveRequest {
    pub const PATH: &'static str = "move";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_path_encodes_flags_as_digits() {
        let query = InfoQuery {
            player: 1,
            admin: true,
            from: -1,
        };
        assert_eq!(query.path(), "info?player=1&admin=1&from=-1");
    }

    #[test]
    fn version_path_carries_target_and_cursor() {
        let query = VersionQuery {
            target: 5,
            player: 0,
            admin: false,
            auto_current_player: true,
            from: 3,
        };
        assert_eq!(
            query.path(),
            "version/5?player=0&admin=0&current=1&from=3"
        );
    }
}
