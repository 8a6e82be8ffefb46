//! Store configuration, loaded from environment variables.

use std::path::PathBuf;

/// Runtime configuration for the simulation record store.
///
/// Every field has a default so the store opens without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL (default: `"sqlite://esim.db"`).
    /// `"sqlite::memory:"` keeps everything in a single in-process connection.
    pub database_url: String,

    /// Upper bound on pooled database connections.
    pub max_connections: u32,

    /// Directory uploaded SPICE files are written to.
    pub media_root: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"esim_store=debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build a [`Config`] for the given database and media root, with
    /// default logging and pool settings.
    pub fn new(database_url: impl Into<String>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            database_url: database_url.into(),
            media_root: media_root.into(),
            ..Self::default()
        }
    }

    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env_or("ESIM_DATABASE_URL", &defaults.database_url),
            max_connections: parse_env("ESIM_DB_MAX_CONNECTIONS", defaults.max_connections),
            media_root: std::env::var_os("ESIM_MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            log_level: env_or("ESIM_LOG", &defaults.log_level),
            log_json: std::env::var("ESIM_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.log_json),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://esim.db".to_owned(),
            max_connections: 5,
            media_root: PathBuf::from("media"),
            log_level: "info".to_owned(),
            log_json: false,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_defaults_for_unspecified_fields() {
        let cfg = Config::new("sqlite::memory:", "/srv/esim/media");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.media_root, PathBuf::from("/srv/esim/media"));
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u32 = parse_env("ESIM_TEST_SURELY_UNSET_VARIABLE", 7);
        assert_eq!(value, 7);
    }
}
