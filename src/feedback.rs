//! Human feedback ledger and per-engine performance analysis.
//!
//! Two append-only collections live here: the message ledger (every
//! generated response the system may later receive a rating for) and the
//! feedback records themselves. Records are immutable once written —
//! aggregated, never mutated in place.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::config::{
    BAD_RATING_THRESHOLD, GOOD_RATING_THRESHOLD, MIN_RELIABLE_FEEDBACK, RATING_GAP_THRESHOLD,
};
use crate::error::RouterError;
use crate::types::{EngineStats, FeedbackRecord, GeneratedMessage, PerformanceReport};

/// Complaint categories mined from low-rating comments, with the phrases
/// that indicate each.
const COMMENT_PATTERNS: &[(&str, &[&str])] = &[
    ("wrong engine", &["equivocado", "mal modelo", "wrong model", "wrong engine"]),
    ("slow responses", &["lento", "slow", "demasiado tiempo"]),
    ("poor quality", &["malo", "pobre", "inútil", "terrible", "useless"]),
    ("incomplete answers", &["incompleto", "falta", "incomplete", "unfinished"]),
    ("off-topic answers", &["irrelevante", "off topic", "no responde"]),
];

/// Ratings at or below this value are scanned for complaint patterns.
const COMPLAINT_RATING_MAX: u8 = 3;

/// Append-only feedback store with an analyzer over a trailing window.
pub struct FeedbackStore {
    messages: RwLock<Vec<GeneratedMessage>>,
    records: RwLock<Vec<FeedbackRecord>>,
}

impl FeedbackStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            records: RwLock::new(Vec::new()),
        }
    }

    // ── Message ledger ────────────────────────────────────────────────────────

    /// Register a generated response so feedback can reference it later.
    /// Returns the new message id.
    pub fn register_message(&self, session_id: &str, engine_name: &str, content: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.messages
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(GeneratedMessage {
                id: id.clone(),
                session_id: session_id.to_string(),
                engine_name: engine_name.to_string(),
                content: content.to_string(),
                created_at: SystemTime::now(),
            });
        id
    }

    /// The engine that produced a registered message, if known.
    pub fn engine_for_message(&self, message_id: &str) -> Option<String> {
        self.messages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.engine_name.clone())
    }

    // ── Recording ─────────────────────────────────────────────────────────────

    /// Record a human rating for a previously generated message.
    ///
    /// # Errors
    /// [`RouterError::Validation`] when the rating is outside 1–5 or the
    /// message id does not reference a known generation.
    pub fn record_feedback(
        &self,
        message_id: &str,
        session_id: &str,
        rating: u8,
        comment: Option<&str>,
    ) -> Result<String, RouterError> {
        if !(1..=5).contains(&rating) {
            return Err(RouterError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }

        let engine_name = self.engine_for_message(message_id).ok_or_else(|| {
            RouterError::Validation(format!("message id {} not found", message_id))
        })?;

        let id = Uuid::new_v4().to_string();
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(FeedbackRecord {
                id: id.clone(),
                message_id: message_id.to_string(),
                session_id: session_id.to_string(),
                rating,
                comment: comment.map(str::to_string),
                engine_name: engine_name.clone(),
                created_at: SystemTime::now(),
            });

        info!(rating, engine = %engine_name, "feedback recorded");
        Ok(id)
    }

    /// The most recent feedback records, newest first.
    pub fn recent_feedback(&self, limit: usize) -> Vec<FeedbackRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Analyzer ──────────────────────────────────────────────────────────────

    /// Aggregate the trailing `window_days` of feedback into per-engine
    /// statistics and qualitative suggestions.
    ///
    /// Engines without any record in the window do not appear in the
    /// report at all.
    pub fn analyze_performance(&self, window_days: u64) -> PerformanceReport {
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(window_days * 24 * 60 * 60))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let in_window: Vec<&FeedbackRecord> =
            records.iter().filter(|r| r.created_at >= cutoff).collect();

        let mut by_engine: BTreeMap<String, Vec<&FeedbackRecord>> = BTreeMap::new();
        for record in &in_window {
            by_engine
                .entry(record.engine_name.clone())
                .or_default()
                .push(record);
        }

        let mut engine_performance = BTreeMap::new();
        for (engine, recs) in &by_engine {
            let total = recs.len();
            let sum: u64 = recs.iter().map(|r| u64::from(r.rating)).sum();
            let good = recs
                .iter()
                .filter(|r| r.rating >= GOOD_RATING_THRESHOLD)
                .count();
            let bad = recs
                .iter()
                .filter(|r| r.rating <= BAD_RATING_THRESHOLD)
                .count();

            engine_performance.insert(
                engine.clone(),
                EngineStats {
                    total_feedback: total,
                    avg_rating: sum as f64 / total as f64,
                    min_rating: recs.iter().map(|r| r.rating).min().unwrap_or(0),
                    max_rating: recs.iter().map(|r| r.rating).max().unwrap_or(0),
                    good_ratings: good,
                    bad_ratings: bad,
                    good_percentage: good as f64 / total as f64 * 100.0,
                    bad_percentage: bad as f64 / total as f64 * 100.0,
                },
            );
        }

        let best_engine = extreme_engine(&engine_performance, |a, b| a > b);
        let worst_engine = extreme_engine(&engine_performance, |a, b| a < b);
        let suggestions = build_suggestions(
            &engine_performance,
            best_engine.as_deref(),
            worst_engine.as_deref(),
            &in_window,
        );

        PerformanceReport {
            period_days: window_days,
            total_feedback: in_window.len(),
            engine_performance,
            suggestions,
            best_engine,
            worst_engine,
        }
    }
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine whose average rating wins under `better`, ties to the first name.
fn extreme_engine(
    stats: &BTreeMap<String, EngineStats>,
    better: fn(f64, f64) -> bool,
) -> Option<String> {
    let mut result: Option<(&String, f64)> = None;
    for (name, s) in stats {
        match result {
            Some((_, current)) if !better(s.avg_rating, current) => {}
            _ => result = Some((name, s.avg_rating)),
        }
    }
    result.map(|(name, _)| name.clone())
}

fn build_suggestions(
    stats: &BTreeMap<String, EngineStats>,
    best: Option<&str>,
    worst: Option<&str>,
    in_window: &[&FeedbackRecord],
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if stats.is_empty() {
        return vec!["Not enough feedback to generate suggestions.".to_string()];
    }

    if let Some(best) = best {
        let avg = stats[best].avg_rating;
        if avg > 4.0 {
            suggestions.push(format!(
                "{} is performing excellently (avg rating {:.1})",
                best, avg
            ));
        }
    }
    if let Some(worst) = worst {
        let avg = stats[worst].avg_rating;
        if avg < 3.0 {
            suggestions.push(format!("{} needs attention (avg rating {:.1})", worst, avg));
        }
    }

    // Complaint mining over low-rating comments.
    for (label, phrases) in COMMENT_PATTERNS {
        let mut per_engine: BTreeMap<&str, usize> = BTreeMap::new();
        for record in in_window {
            if record.rating > COMPLAINT_RATING_MAX {
                continue;
            }
            let Some(comment) = &record.comment else { continue };
            let lower = comment.to_lowercase();
            if phrases.iter().any(|p| lower.contains(p)) {
                *per_engine.entry(record.engine_name.as_str()).or_default() += 1;
            }
        }
        if let Some((engine, count)) = per_engine.into_iter().max_by_key(|(_, c)| *c) {
            suggestions.push(format!(
                "Frequent '{}' complaints about {} ({} in window)",
                label, engine, count
            ));
        }
    }

    let total: usize = stats.values().map(|s| s.total_feedback).sum();
    if total < MIN_RELIABLE_FEEDBACK {
        suggestions.push(format!(
            "Collect more feedback (at least {} ratings) for a reliable analysis",
            MIN_RELIABLE_FEEDBACK
        ));
    }

    if stats.len() > 1 {
        let ratings: Vec<f64> = stats.values().map(|s| s.avg_rating).collect();
        let max = ratings.iter().cloned().fold(f64::MIN, f64::max);
        let min = ratings.iter().cloned().fold(f64::MAX, f64::min);
        if max - min > RATING_GAP_THRESHOLD {
            suggestions.push(
                "Large quality gap between engines — consider rebalancing priorities".to_string(),
            );
        }
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_rated(engine: &str, ratings: &[u8]) -> FeedbackStore {
        let store = FeedbackStore::new();
        for rating in ratings {
            let id = store.register_message("s1", engine, "a response");
            store.record_feedback(&id, "s1", *rating, None).unwrap();
        }
        store
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let store = FeedbackStore::new();
        let id = store.register_message("s1", "fast", "text");
        assert!(matches!(
            store.record_feedback(&id, "s1", 0, None),
            Err(RouterError::Validation(_))
        ));
        assert!(matches!(
            store.record_feedback(&id, "s1", 6, None),
            Err(RouterError::Validation(_))
        ));
        assert!(store.record_feedback(&id, "s1", 5, None).is_ok());
    }

    #[test]
    fn unknown_message_is_rejected() {
        let store = FeedbackStore::new();
        assert!(matches!(
            store.record_feedback("no-such-id", "s1", 4, None),
            Err(RouterError::Validation(_))
        ));
    }

    #[test]
    fn engine_name_is_resolved_from_the_ledger() {
        let store = FeedbackStore::new();
        let id = store.register_message("s1", "deep", "text");
        store.record_feedback(&id, "s1", 4, None).unwrap();
        assert_eq!(store.recent_feedback(1)[0].engine_name, "deep");
    }

    #[test]
    fn analyzer_aggregates_per_engine() {
        let store = store_with_rated("fast", &[5, 4, 4, 2]);
        let report = store.analyze_performance(7);
        let stats = &report.engine_performance["fast"];

        assert_eq!(stats.total_feedback, 4);
        assert!((stats.avg_rating - 3.75).abs() < 1e-9);
        assert_eq!(stats.min_rating, 2);
        assert_eq!(stats.max_rating, 5);
        assert_eq!(stats.good_ratings, 3);
        assert_eq!(stats.bad_ratings, 1);
    }

    #[test]
    fn best_and_worst_engines_are_identified() {
        let store = FeedbackStore::new();
        for (engine, rating) in [("fast", 5), ("fast", 5), ("deep", 2), ("deep", 1)] {
            let id = store.register_message("s1", engine, "text");
            store.record_feedback(&id, "s1", rating, None).unwrap();
        }
        let report = store.analyze_performance(7);
        assert_eq!(report.best_engine.as_deref(), Some("fast"));
        assert_eq!(report.worst_engine.as_deref(), Some("deep"));
        // 5.0 vs 1.5: gap suggestion must fire.
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("quality gap")));
    }

    #[test]
    fn empty_window_yields_placeholder_suggestion() {
        let store = FeedbackStore::new();
        let report = store.analyze_performance(7);
        assert!(report.engine_performance.is_empty());
        assert_eq!(report.suggestions.len(), 1);
        assert!(report.suggestions[0].contains("Not enough feedback"));
    }

    #[test]
    fn complaint_patterns_are_mined_from_comments() {
        let store = FeedbackStore::new();
        for _ in 0..3 {
            let id = store.register_message("s1", "fast", "text");
            store
                .record_feedback(&id, "s1", 2, Some("respuesta muy lento otra vez"))
                .unwrap();
        }
        let report = store.analyze_performance(7);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("slow responses") && s.contains("fast")));
    }

    #[test]
    fn high_rating_comments_are_not_mined() {
        let store = FeedbackStore::new();
        let id = store.register_message("s1", "fast", "text");
        store
            .record_feedback(&id, "s1", 5, Some("not slow at all"))
            .unwrap();
        let report = store.analyze_performance(7);
        assert!(!report.suggestions.iter().any(|s| s.contains("slow responses")));
    }

    #[test]
    fn recent_feedback_is_newest_first() {
        let store = FeedbackStore::new();
        let first = store.register_message("s1", "fast", "text");
        let second = store.register_message("s1", "fast", "text");
        store.record_feedback(&first, "s1", 3, None).unwrap();
        store.record_feedback(&second, "s1", 4, None).unwrap();

        let recent = store.recent_feedback(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message_id, second);
        assert_eq!(recent[1].message_id, first);
    }
}
