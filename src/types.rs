//! Shared types and data structures for the routing core.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// ── Signals ───────────────────────────────────────────────────────────────────

/// Named boolean signals derived from raw request text.
///
/// Computed once per request by [`crate::signals::extract`]; immutable and
/// fully populated (every field present, default `false`). Used only for
/// routing — never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    /// Terminal `?` or interrogative opener.
    pub is_question: bool,
    /// Token count at or below the short-message threshold.
    pub is_short: bool,
    /// Architecture / scaling / system-design language.
    pub mentions_architecture: bool,
    /// Any code-related vocabulary (languages, tooling, errors).
    pub mentions_code: bool,
    /// Error/exception/fix vocabulary.
    pub mentions_debug: bool,
    /// Action verb AND code/algorithm noun co-occurring.
    pub wants_code_generation: bool,
    /// Strategic / planning language.
    pub mentions_strategy: bool,
    /// Deep-analysis / evaluation language.
    pub mentions_complex: bool,
    /// Explicit reference to an image or photo.
    pub mentions_image: bool,
    /// Documentation / tutorial / guide requests.
    pub mentions_docs: bool,
}

impl Signals {
    /// Names of all signals that evaluated `true`, in declaration order.
    ///
    /// Feeds the human-readable `reasoning` field of a routing decision;
    /// not consumed by any downstream logic.
    pub fn active_names(&self) -> Vec<&'static str> {
        let pairs = [
            ("is_question", self.is_question),
            ("is_short", self.is_short),
            ("mentions_architecture", self.mentions_architecture),
            ("mentions_code", self.mentions_code),
            ("mentions_debug", self.mentions_debug),
            ("wants_code_generation", self.wants_code_generation),
            ("mentions_strategy", self.mentions_strategy),
            ("mentions_complex", self.mentions_complex),
            ("mentions_image", self.mentions_image),
            ("mentions_docs", self.mentions_docs),
        ];
        pairs.iter().filter(|(_, v)| *v).map(|(n, _)| *n).collect()
    }
}

// ── Routing decision ──────────────────────────────────────────────────────────

/// A scored engine candidate (non-winning candidates become alternatives).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredEngine {
    pub engine: String,
    pub score: i64,
}

/// Outcome of a single dispatch computation.
///
/// Created fresh per request, never persisted, consumed immediately by the
/// caller to invoke the engine or show a clarification prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// An engine was selected.
    Ok {
        /// Name of the winning engine.
        engine: String,
        /// Non-authoritative strength of the choice, 0–100.
        confidence: u8,
        /// Comma-joined list of active signal names (observability only).
        reasoning: String,
        /// Next-best candidates in score order, excluding the winner.
        alternatives: Vec<ScoredEngine>,
    },
    /// The request was too vague to route; ask the user for detail.
    NeedsClarification {
        /// Prompt to show the user.
        prompt: String,
    },
}

impl RoutingDecision {
    /// The selected engine name, if any.
    pub fn engine(&self) -> Option<&str> {
        match self {
            RoutingDecision::Ok { engine, .. } => Some(engine),
            RoutingDecision::NeedsClarification { .. } => None,
        }
    }
}

// ── Generation parameters ─────────────────────────────────────────────────────

/// The subset of generation parameters that affects response content, and
/// therefore cache identity. Anything else (stream flags, callbacks) is
/// deliberately excluded from the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
}

impl GenerationParams {
    /// Canonical text form used in cache-key hashing.
    ///
    /// Fixed field order so identical parameters always produce identical
    /// key material.
    pub fn cache_facet(&self) -> String {
        format!(
            "temperature={:?},max_tokens={:?},top_p={:?}",
            self.temperature, self.max_tokens, self.top_p
        )
    }
}

// ── Cache types ───────────────────────────────────────────────────────────────

/// A cached engine response returned on a lookup hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// Deserialized response payload.
    pub response: serde_json::Value,
    /// Deterministic cache key of the entry.
    pub cache_key: String,
    /// When the entry was stored.
    pub created_at: SystemTime,
    /// Hit count *after* this lookup (each hit increments by exactly 1).
    pub hit_count: u64,
    /// Caller-supplied metadata stored alongside the response.
    pub metadata: serde_json::Value,
}

/// Aggregate cache counters for dashboards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    /// Entries whose TTL has not yet elapsed.
    pub valid_entries: usize,
    /// Resident entries past their TTL (removed lazily on lookup or purge).
    pub expired_entries: usize,
    pub total_hits: u64,
    /// Approximate payload size in bytes.
    pub size_bytes: usize,
    /// Engine with the most cached entries, if any.
    pub top_engine: Option<String>,
}

// ── Feedback types ────────────────────────────────────────────────────────────

/// A generated response registered with the feedback ledger.
///
/// Feedback may only reference messages that exist here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub id: String,
    pub session_id: String,
    pub engine_name: String,
    /// Response text (truncated views are produced at display time).
    pub content: String,
    pub created_at: SystemTime,
}

/// A single human rating of a generated response. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub message_id: String,
    pub session_id: String,
    /// 1 = poor, 5 = excellent.
    pub rating: u8,
    pub comment: Option<String>,
    pub engine_name: String,
    pub created_at: SystemTime,
}

/// Per-engine aggregate over the trailing feedback window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_feedback: usize,
    pub avg_rating: f64,
    pub min_rating: u8,
    pub max_rating: u8,
    /// Count of ratings ≥ the good threshold.
    pub good_ratings: usize,
    /// Count of ratings ≤ the bad threshold.
    pub bad_ratings: usize,
    pub good_percentage: f64,
    pub bad_percentage: f64,
}

/// Full analyzer output: per-engine stats plus derived suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub period_days: u64,
    /// BTreeMap for deterministic iteration order in reports and tests.
    pub engine_performance: std::collections::BTreeMap<String, EngineStats>,
    pub suggestions: Vec<String>,
    pub total_feedback: usize,
    pub best_engine: Option<String>,
    pub worst_engine: Option<String>,
}

// ── Optimizer types ───────────────────────────────────────────────────────────

/// One applied priority change, also mirrored into the optimization log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityChange {
    pub engine: String,
    pub old_priority: i64,
    pub new_priority: i64,
    pub delta: i64,
    pub reason: String,
}

/// Append-only audit record, one per engine per run that produced a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationLogEntry {
    pub engine_name: String,
    pub old_priority: i64,
    pub new_priority: i64,
    pub delta: i64,
    pub reason: String,
    pub avg_rating: f64,
    pub sample_count: usize,
    pub created_at: SystemTime,
}

/// Terminal status of an optimizer run.
///
/// | Status      | Meaning                                                |
/// |-------------|--------------------------------------------------------|
/// | `Optimized` | ≥1 change applied and persisted                        |
/// | `NoChanges` | Evaluated, nothing crossed the clamp/threshold         |
/// | `NoData`    | No engine met the minimum-feedback requirement         |
///
/// Persistence or analysis failure is surfaced as the `Err` arm of
/// [`crate::optimizer::AutoOptimizer::optimize`] instead of a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationStatus {
    Optimized,
    NoChanges,
    NoData,
}

impl std::fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OptimizationStatus::Optimized => "optimized",
            OptimizationStatus::NoChanges => "no_changes",
            OptimizationStatus::NoData => "no_data",
        };
        f.write_str(label)
    }
}

/// Result of a single optimizer run.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub status: OptimizationStatus,
    pub changes: Vec<PriorityChange>,
    /// Total feedback records the analyzer saw in the window.
    pub total_feedback_analyzed: usize,
    /// Path of the pre-write profile backup, when one was taken.
    pub backup_path: Option<std::path::PathBuf>,
}
