//! Configuration loading from environment variables via dotenvy,
//! plus the named scoring constants used by the dispatcher.

use std::path::PathBuf;

use crate::error::RouterError;

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the engine profile JSON file — sourced from `ROUTER_PROFILE_PATH`.
    pub profile_path: PathBuf,
    /// Response cache TTL in days — sourced from `ROUTER_CACHE_TTL_DAYS`.
    pub cache_ttl_days: u64,
    /// Hours between background optimizer runs — sourced from
    /// `ROUTER_OPTIMIZE_INTERVAL_HOURS`.
    pub optimize_interval_hours: u64,
    /// Maximum priority change per optimizer run — sourced from
    /// `ROUTER_OPTIMIZE_MAX_CHANGE`.
    pub optimize_max_change: i64,
    /// Minimum feedback samples before an engine is optimized — sourced
    /// from `ROUTER_OPTIMIZE_MIN_FEEDBACK`.
    pub optimize_min_feedback: usize,
    /// Trailing feedback window in days — sourced from
    /// `ROUTER_FEEDBACK_WINDOW_DAYS`.
    pub feedback_window_days: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("config/engine_profiles.json"),
            cache_ttl_days: 7,
            optimize_interval_hours: 24,
            optimize_max_change: 20,
            optimize_min_feedback: 5,
            feedback_window_days: 7,
        }
    }
}

/// Load configuration purely from already-set environment variables.
///
/// Does **not** call `dotenvy::dotenv()` — useful in tests that need to
/// control the env precisely via [`std::env::set_var`] / [`std::env::remove_var`].
///
/// # Errors
/// Returns [`RouterError::Configuration`] if a set variable fails to parse.
pub fn load_config_from_env() -> Result<Config, RouterError> {
    let defaults = Config::default();

    let profile_path = std::env::var("ROUTER_PROFILE_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.profile_path);

    let cache_ttl_days = parse_var("ROUTER_CACHE_TTL_DAYS", defaults.cache_ttl_days)?;
    let optimize_interval_hours =
        parse_var("ROUTER_OPTIMIZE_INTERVAL_HOURS", defaults.optimize_interval_hours)?;
    let optimize_max_change =
        parse_var("ROUTER_OPTIMIZE_MAX_CHANGE", defaults.optimize_max_change)?;
    let optimize_min_feedback =
        parse_var("ROUTER_OPTIMIZE_MIN_FEEDBACK", defaults.optimize_min_feedback)?;
    let feedback_window_days =
        parse_var("ROUTER_FEEDBACK_WINDOW_DAYS", defaults.feedback_window_days)?;

    if optimize_max_change <= 0 {
        return Err(RouterError::Configuration(
            "ROUTER_OPTIMIZE_MAX_CHANGE must be positive".to_string(),
        ));
    }
    if cache_ttl_days == 0 {
        return Err(RouterError::Configuration(
            "ROUTER_CACHE_TTL_DAYS must be at least 1".to_string(),
        ));
    }
    if optimize_interval_hours == 0 {
        return Err(RouterError::Configuration(
            "ROUTER_OPTIMIZE_INTERVAL_HOURS must be at least 1".to_string(),
        ));
    }

    Ok(Config {
        profile_path,
        cache_ttl_days,
        optimize_interval_hours,
        optimize_max_change,
        optimize_min_feedback,
        feedback_window_days,
    })
}

/// Load configuration from the environment (`.env` + system env vars).
///
/// Loads `.env` via `dotenvy` first (ignoring errors if the file is absent),
/// then delegates to [`load_config_from_env`].
pub fn load_config() -> Result<Config, RouterError> {
    // Load .env if present; ignore the error — variables may already be set externally.
    let _ = dotenvy::dotenv();
    load_config_from_env()
}

/// Parse an optional env var, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, RouterError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| RouterError::Configuration(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

// ── Priority bounds ────────────────────────────────────────────────────────

/// Lowest priority an engine profile may hold.
pub const PRIORITY_MIN: i64 = 1;

/// Highest priority an engine profile may hold.
pub const PRIORITY_MAX: i64 = 100;

// ── Scoring rule constants ─────────────────────────────────────────────────
//
// One internally-consistent rule set, scaled to the 1–100 priority domain.
// Confidence is the winner's score clamped to [50,100], so bonuses stay
// below 50 to remain visible in the confidence value.

/// Architecture/scale language: bonus for reasoning-capable engines.
pub const ARCHITECTURE_BONUS: i64 = 40;

/// Architecture/scale language: penalty for engines without reasoning.
pub const ARCHITECTURE_PENALTY: i64 = 25;

/// Strategic planning + code generation together: bonus for reasoning engines.
pub const STRATEGY_CODE_BONUS: i64 = 30;

/// Strategic planning + code generation together: penalty otherwise.
pub const STRATEGY_CODE_PENALTY: i64 = 15;

/// Pure code-generation intent: bonus for code-capable engines.
pub const CODEGEN_BONUS: i64 = 25;

/// Pure code-generation intent: penalty for reasoning-only engines
/// (avoids overkill routing of small snippets to heavyweight engines).
pub const CODEGEN_OVERKILL_PENALTY: i64 = 10;

/// Debugging intent: bonus for code-capable engines.
pub const DEBUG_BONUS: i64 = 20;

/// Debugging intent: penalty for reasoning-only engines.
pub const DEBUG_OVERKILL_PENALTY: i64 = 5;

/// Complex-analysis language without code or image: bonus for reasoning engines.
pub const COMPLEX_BONUS: i64 = 25;

/// Complex-analysis language: penalty for code-only engines.
pub const COMPLEX_PENALTY: i64 = 10;

/// Short/low-information message: bonus for lightweight/general engines.
pub const SHORT_QUERY_BONUS: i64 = 15;

/// Short/low-information message: penalty for vision-specialized engines.
pub const SHORT_VISION_PENALTY: i64 = 20;

/// Short/low-information message: penalty for reasoning-specialized engines.
pub const SHORT_REASONING_PENALTY: i64 = 10;

// ── Analyzer thresholds ────────────────────────────────────────────────────

/// Rating at or above which a feedback record counts as "good".
pub const GOOD_RATING_THRESHOLD: u8 = 4;

/// Rating at or below which a feedback record counts as "bad".
pub const BAD_RATING_THRESHOLD: u8 = 2;

/// Neutral baseline on the 1–5 rating scale; deltas are measured from here.
pub const RATING_BASELINE: f64 = 3.0;

/// Priority points moved per full rating point above/below the baseline.
pub const PRIORITY_PER_RATING_POINT: f64 = 20.0;

/// Minimum total feedback before the analyzer considers its numbers reliable.
pub const MIN_RELIABLE_FEEDBACK: usize = 10;

/// Average-rating gap between best and worst engine that triggers a
/// rebalancing suggestion.
pub const RATING_GAP_THRESHOLD: f64 = 1.0;
