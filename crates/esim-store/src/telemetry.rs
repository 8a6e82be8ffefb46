//! Structured logging set-up for processes embedding the store.

use std::error::Error;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install a global `tracing` subscriber configured from `cfg`.
///
/// `RUST_LOG` wins over `cfg.log_level`; an unparsable level falls back to
/// `info` with a warning on stderr. Fails if a global subscriber is already
/// installed.
pub fn init_tracing(cfg: &Config) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let env_filter = build_filter(&cfg.log_level);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
}

fn build_filter(log_level: &str) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ESIM_LOG='{log_level}' is not a valid tracing filter ({e}); \
                     falling back to 'info'"
                );
                EnvFilter::new("info")
            }
        },
    }
}
