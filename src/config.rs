//! Application-level configuration loading.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{services::sport::Sport, state::game::TeamId};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SCORE_RELAY_CONFIG_PATH";
const DEFAULT_TRACKED_GAMES_PATH: &str = "data/tracked_games.json";
/// Public NHL web API.
pub const DEFAULT_NHL_BASE_URL: &str = "https://api-web.nhle.com/v1";

/// Where game snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedConfig {
    /// Live NHL web API.
    Nhl {
        #[serde(default = "default_nhl_base_url")]
        base_url: String,
    },
    /// Snapshot files on disk.
    Fixture { dir: PathBuf },
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig::Nhl {
            base_url: default_nhl_base_url(),
        }
    }
}

fn default_nhl_base_url() -> String {
    DEFAULT_NHL_BASE_URL.to_string()
}

/// Polling cadence per lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub pregame: Duration,
    pub live: Duration,
    pub settling: Duration,
    /// How long to wait for the post-game summary after the final status.
    pub settling_window: Duration,
    /// UTC hour at which the daily discovery pass runs.
    pub discovery_hour_utc: u8,
    /// Upper bound on the side effects of one lifecycle transition.
    pub transition_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            pregame: Duration::from_secs(300),
            live: Duration::from_secs(10),
            settling: Duration::from_secs(60),
            settling_window: Duration::from_secs(45 * 60),
            discovery_hour_utc: 10,
            transition_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub sport: Sport,
    pub favorite_team_id: Option<TeamId>,
    pub tracked_games_path: PathBuf,
    pub feed: FeedConfig,
    pub polling: PollingConfig,
    /// Delay between two replayed notifications.
    pub replay_pace: Duration,
    /// Token required on admin routes; open access when `None`.
    pub admin_token: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load from an explicit path with the same fallback rules as [`AppConfig::load`].
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        sport = ?app_config.sport,
                        favorite_team_id = ?app_config.favorite_team_id,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    sport: Sport,
    favorite_team_id: Option<TeamId>,
    tracked_games_path: Option<PathBuf>,
    feed: FeedConfig,
    polling: RawPolling,
    replay: RawReplay,
    admin_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// Polling periods in seconds; missing entries keep their defaults.
struct RawPolling {
    pregame_secs: Option<u64>,
    live_secs: Option<u64>,
    settling_secs: Option<u64>,
    settling_window_secs: Option<u64>,
    discovery_hour_utc: Option<u8>,
    transition_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawReplay {
    pace_ms: u64,
}

impl Default for RawReplay {
    fn default() -> Self {
        Self { pace_ms: 1_000 }
    }
}

impl From<RawPolling> for PollingConfig {
    fn from(raw: RawPolling) -> Self {
        let defaults = PollingConfig::default();
        let secs = |value: Option<u64>, fallback: Duration| {
            value
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };
        Self {
            pregame: secs(raw.pregame_secs, defaults.pregame),
            live: secs(raw.live_secs, defaults.live),
            settling: secs(raw.settling_secs, defaults.settling),
            settling_window: secs(raw.settling_window_secs, defaults.settling_window),
            discovery_hour_utc: raw
                .discovery_hour_utc
                .filter(|hour| *hour < 24)
                .unwrap_or(defaults.discovery_hour_utc),
            transition_timeout: secs(raw.transition_timeout_secs, defaults.transition_timeout),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            sport: value.sport,
            favorite_team_id: value.favorite_team_id,
            tracked_games_path: value
                .tracked_games_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACKED_GAMES_PATH)),
            feed: value.feed,
            polling: value.polling.into(),
            replay_pace: Duration::from_millis(value.replay.pace_ms),
            admin_token: value.admin_token.filter(|token| !token.is_empty()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_object_yields_defaults() {
        let config = parse("{}");
        assert_eq!(config.sport, Sport::Hockey);
        assert_eq!(config.favorite_team_id, None);
        assert_eq!(config.feed, FeedConfig::default());
        assert_eq!(config.polling, PollingConfig::default());
        assert_eq!(config.replay_pace, Duration::from_millis(1_000));
    }

    #[test]
    fn full_config_is_parsed() {
        let config = parse(
            r#"{
                "sport": "baseball",
                "favorite_team_id": 14,
                "tracked_games_path": "/tmp/ids.json",
                "feed": { "kind": "fixture", "dir": "fixtures" },
                "polling": { "live_secs": 5, "discovery_hour_utc": 9 },
                "replay": { "pace_ms": 250 },
                "admin_token": "secret"
            }"#,
        );
        assert_eq!(config.sport, Sport::Baseball);
        assert_eq!(config.favorite_team_id, Some(14));
        assert_eq!(config.tracked_games_path, PathBuf::from("/tmp/ids.json"));
        assert_eq!(
            config.feed,
            FeedConfig::Fixture {
                dir: PathBuf::from("fixtures")
            }
        );
        assert_eq!(config.polling.live, Duration::from_secs(5));
        assert_eq!(config.polling.pregame, PollingConfig::default().pregame);
        assert_eq!(config.polling.discovery_hour_utc, 9);
        assert_eq!(config.replay_pace, Duration::from_millis(250));
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn nhl_feed_defaults_base_url() {
        let config = parse(r#"{ "feed": { "kind": "nhl" } }"#);
        assert_eq!(config.feed, FeedConfig::default());
    }

    #[test]
    fn out_of_range_values_fall_back() {
        let config = parse(r#"{ "polling": { "live_secs": 0, "discovery_hour_utc": 30 }, "admin_token": "" }"#);
        assert_eq!(config.polling.live, PollingConfig::default().live);
        assert_eq!(config.polling.discovery_hour_utc, 10);
        assert_eq!(config.admin_token, None);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/score-relay/app.json"));
        assert_eq!(config.polling, PollingConfig::default());
    }
}
