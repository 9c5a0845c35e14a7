//! Client configuration from the environment.

use std::time::Duration;

use url::Url;

use crate::application::{SessionSettings, ViewerParams};
use crate::infrastructure::scheduler::DEFAULT_FRAME_INTERVAL;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8888";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub server_url: Url,
    pub socket_url: Url,
    pub game_name: String,
    pub game_id: String,
    pub viewer: ViewerParams,
    pub reconnect_delay: Duration,
    pub fetch_retry_delay: Duration,
    pub frame_interval: Duration,
    pub timer_tick_interval: Duration,
}

impl ClientConfig {
    /// Read `BOARDSYNC_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset and blank values are treated
    /// alike.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let game_name = required("BOARDSYNC_GAME_NAME")?;
        let game_id = required("BOARDSYNC_GAME_ID")?;

        let server_url = parse_url(
            "BOARDSYNC_SERVER_URL",
            &get("BOARDSYNC_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
        )?;
        let server_url = with_trailing_slash(server_url);

        let mut config = Self {
            socket_url: server_url.clone(),
            server_url,
            game_name,
            game_id,
            viewer: ViewerParams {
                player: parse_or("BOARDSYNC_PLAYER", get("BOARDSYNC_PLAYER"), 0)?,
                admin: parse_flag("BOARDSYNC_ADMIN", get("BOARDSYNC_ADMIN"))?,
                auto_current_player: parse_flag(
                    "BOARDSYNC_AUTO_CURRENT_PLAYER",
                    get("BOARDSYNC_AUTO_CURRENT_PLAYER"),
                )?,
            },
            reconnect_delay: parse_millis(
                "BOARDSYNC_RECONNECT_DELAY_MS",
                get("BOARDSYNC_RECONNECT_DELAY_MS"),
                SessionSettings::DEFAULT_RECONNECT_DELAY,
            )?,
            fetch_retry_delay: parse_millis(
                "BOARDSYNC_FETCH_RETRY_DELAY_MS",
                get("BOARDSYNC_FETCH_RETRY_DELAY_MS"),
                SessionSettings::DEFAULT_FETCH_RETRY_DELAY,
            )?,
            frame_interval: parse_millis(
                "BOARDSYNC_FRAME_INTERVAL_MS",
                get("BOARDSYNC_FRAME_INTERVAL_MS"),
                DEFAULT_FRAME_INTERVAL,
            )?,
            timer_tick_interval: parse_millis(
                "BOARDSYNC_TIMER_TICK_MS",
                get("BOARDSYNC_TIMER_TICK_MS"),
                SessionSettings::DEFAULT_TIMER_TICK_INTERVAL,
            )?,
        };

        config.socket_url = match get("BOARDSYNC_SOCKET_URL") {
            Some(raw) => parse_url("BOARDSYNC_SOCKET_URL", &raw)?,
            None => config.derived_socket_url()?,
        };
        Ok(config)
    }

    /// `<server>/api/game/<name>/<id>/`, the root for every endpoint.
    pub fn game_base_url(&self) -> Result<Url, ConfigError> {
        self.server_url
            .join(&format!("api/game/{}/{}/", self.game_name, self.game_id))
            .map_err(|e| ConfigError::invalid("BOARDSYNC_GAME_NAME", e))
    }

    fn derived_socket_url(&self) -> Result<Url, ConfigError> {
        let mut url = self
            .game_base_url()?
            .join("socket")
            .map_err(|e| ConfigError::invalid("BOARDSYNC_SERVER_URL", e))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::invalid("BOARDSYNC_SERVER_URL", "not an http(s) URL"))?;
        Ok(url)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            game_name: self.game_name.clone(),
            socket_url: self.socket_url.to_string(),
            viewer: self.viewer,
            reconnect_delay: self.reconnect_delay,
            fetch_retry_delay: self.fetch_retry_delay,
            timer_tick_interval: self.timer_tick_interval,
        }
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::invalid(name, e))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e| ConfigError::invalid(name, e)),
        None => Ok(default),
    }
}

fn parse_millis(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::invalid(name, e)),
        None => Ok(default),
    }
}

fn parse_flag(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::invalid(name, format!("expected a boolean, got {other:?}"))),
    }
}

/// Load `.env.local` then `.env` from the workspace root, if present.
pub fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const GAME: [(&str, &str); 2] = [("BOARDSYNC_GAME_NAME", "memory"), ("BOARDSYNC_GAME_ID", "g-1")];

    #[test]
    fn defaults_apply_when_only_the_game_is_set() {
        let config = config(&GAME).unwrap();

        assert_eq!(config.server_url.as_str(), "http://localhost:8888/");
        assert_eq!(
            config.socket_url.as_str(),
            "ws://localhost:8888/api/game/memory/g-1/socket"
        );
        assert_eq!(
            config.game_base_url().unwrap().as_str(),
            "http://localhost:8888/api/game/memory/g-1/"
        );
        assert_eq!(config.viewer, ViewerParams::default());
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.fetch_retry_delay, Duration::from_millis(1_000));
        assert_eq!(config.frame_interval, Duration::from_millis(16));
        assert_eq!(config.timer_tick_interval, Duration::from_millis(50));
    }

    #[test]
    fn game_identity_is_required() {
        assert_eq!(
            config(&[("BOARDSYNC_GAME_ID", "g-1")]).unwrap_err(),
            ConfigError::Missing("BOARDSYNC_GAME_NAME")
        );
        assert_eq!(
            config(&[("BOARDSYNC_GAME_NAME", "memory"), ("BOARDSYNC_GAME_ID", "  ")]).unwrap_err(),
            ConfigError::Missing("BOARDSYNC_GAME_ID")
        );
    }

    #[test]
    fn secure_server_derives_secure_socket_under_a_prefix() {
        let mut vars = GAME.to_vec();
        vars.push(("BOARDSYNC_SERVER_URL", "https://games.example.com/boards"));
        let config = config(&vars).unwrap();

        assert_eq!(
            config.socket_url.as_str(),
            "wss://games.example.com/boards/api/game/memory/g-1/socket"
        );
    }

    #[test]
    fn explicit_values_override_defaults() {
        let mut vars = GAME.to_vec();
        vars.extend([
            ("BOARDSYNC_SOCKET_URL", "ws://push.local:9000/feed"),
            ("BOARDSYNC_PLAYER", "2"),
            ("BOARDSYNC_ADMIN", "true"),
            ("BOARDSYNC_AUTO_CURRENT_PLAYER", "1"),
            ("BOARDSYNC_RECONNECT_DELAY_MS", "500"),
        ]);
        let config = config(&vars).unwrap();
        let settings = config.session_settings();

        assert_eq!(settings.socket_url, "ws://push.local:9000/feed");
        assert_eq!(settings.game_name, "memory");
        assert_eq!(settings.viewer.player, 2);
        assert!(settings.viewer.admin);
        assert!(settings.viewer.auto_current_player);
        assert_eq!(settings.reconnect_delay, Duration::from_millis(500));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = GAME.to_vec();
        vars.push(("BOARDSYNC_ADMIN", "maybe"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: "BOARDSYNC_ADMIN", .. })
        ));

        let mut vars = GAME.to_vec();
        vars.push(("BOARDSYNC_TIMER_TICK_MS", "-5"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: "BOARDSYNC_TIMER_TICK_MS", .. })
        ));
    }
}
