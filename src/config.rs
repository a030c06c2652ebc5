// src/config.rs

use std::env;
use std::time::Duration;
use dotenvy::dotenv;

/// Time limit applied when a teacher creates a quiz without one.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 600;

/// Upper bound on questions per quiz.
pub const MAX_QUESTIONS: usize = 100;

/// Title used when neither a title nor a source file name is supplied.
pub const UNTITLED_QUIZ: &str = "Untitled Quiz";

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` runs the service on in-memory storage.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Origin of the student-facing frontend, used to build share links.
    pub public_base_url: String,
    pub bind_addr: String,
    /// Countdown period for attempt sessions.
    pub attempt_tick: Duration,
    /// An active attempt nobody has polled for this long is abandoned.
    pub attempt_idle: Duration,
    /// How long a finished attempt stays available for its result screen.
    pub attempt_retain: Duration,
    pub leaderboard_refresh: Duration,
    /// A leaderboard poller stops after this long without an observer.
    pub leaderboard_idle: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = parse_or("JWT_EXPIRATION", 86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            public_base_url,
            bind_addr,
            attempt_tick: Duration::from_millis(parse_or("ATTEMPT_TICK_MS", 1_000)),
            attempt_idle: Duration::from_secs(parse_or("ATTEMPT_IDLE_SECS", 120)),
            attempt_retain: Duration::from_secs(parse_or("ATTEMPT_RETAIN_SECS", 600)),
            leaderboard_refresh: Duration::from_secs(parse_or("LEADERBOARD_REFRESH_SECS", 5)),
            leaderboard_idle: Duration::from_secs(parse_or("LEADERBOARD_IDLE_SECS", 30)),
        }
    }
}

/// Numeric settings must be positive; anything else falls back to `default`.
fn parse_or(key: &str, default: u64) -> u64 {
    parse_setting(key, env::var(key).ok().as_deref(), default)
}

fn parse_setting(key: &str, raw: Option<&str>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            tracing::warn!("{} must be greater than zero, using {}", key, default);
            default
        }
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }
    }
}
