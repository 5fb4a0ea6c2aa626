//! Feedback-driven priority optimization.
//!
//! Reads the analyzer's trailing-window statistics and moves each engine's
//! base priority toward its observed quality: each 0.5 rating points above
//! or below the 3.0 baseline moves priority by 10, bounded by `max_change`
//! per run and clamped to the 1–100 priority range.
//!
//! Every run that applies a change backs up the previous profile set,
//! saves atomically, appends to the optimization log, and invalidates the
//! response cache unconditionally — a priority shift can change which
//! engine would have produced any cached answer.
//!
//! The background scheduler and the manual trigger path share the same
//! [`AutoOptimizer::optimize`] method.

use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cache::{InvalidationFilter, ResponseCache};
use crate::config::{PRIORITY_MAX, PRIORITY_MIN, PRIORITY_PER_RATING_POINT, RATING_BASELINE};
use crate::error::RouterError;
use crate::feedback::FeedbackStore;
use crate::profiles::EngineProfileStore;
use crate::types::{
    OptimizationLogEntry, OptimizationOutcome, OptimizationStatus, PriorityChange,
};

/// Priority tuner over the profile store, feedback store, and cache.
pub struct AutoOptimizer {
    profiles: Arc<EngineProfileStore>,
    feedback: Arc<FeedbackStore>,
    cache: Arc<ResponseCache>,
    /// Trailing analysis window in days.
    window_days: u64,
    /// Append-only audit trail of applied changes.
    log: RwLock<Vec<OptimizationLogEntry>>,
}

impl AutoOptimizer {
    pub fn new(
        profiles: Arc<EngineProfileStore>,
        feedback: Arc<FeedbackStore>,
        cache: Arc<ResponseCache>,
        window_days: u64,
    ) -> Self {
        Self {
            profiles,
            feedback,
            cache,
            window_days,
            log: RwLock::new(Vec::new()),
        }
    }

    /// Run one optimization pass.
    ///
    /// `max_change` bounds the per-engine priority delta for this run;
    /// `min_feedback` is the sample count an engine needs before its
    /// statistics are trusted.
    ///
    /// # Errors
    /// [`RouterError::Persistence`] / [`RouterError::Serialization`] when
    /// the profile backup or save fails; the live profile file is never
    /// left half-written (write-temp-then-rename).
    pub fn optimize(
        &self,
        max_change: i64,
        min_feedback: usize,
    ) -> Result<OptimizationOutcome, RouterError> {
        info!(max_change, min_feedback, "optimization run starting");

        let report = self.feedback.analyze_performance(self.window_days);
        let total_feedback_analyzed = report.total_feedback;

        let eligible: Vec<_> = report
            .engine_performance
            .iter()
            .filter(|(_, stats)| stats.total_feedback >= min_feedback)
            .collect();

        if eligible.is_empty() {
            info!("no engine met the minimum-feedback requirement");
            return Ok(OptimizationOutcome {
                status: OptimizationStatus::NoData,
                changes: Vec::new(),
                total_feedback_analyzed,
                backup_path: None,
            });
        }

        // Compute bounded deltas against the current profile set.
        let mut changes: Vec<PriorityChange> = Vec::new();
        let mut stats_for_change = Vec::new();
        for (engine, stats) in eligible {
            let Some(profile) = self.profiles.get(engine) else {
                warn!(engine = %engine, "feedback references an unregistered engine; skipping");
                continue;
            };

            let rating_delta = stats.avg_rating - RATING_BASELINE;
            let raw = (rating_delta * PRIORITY_PER_RATING_POINT).trunc() as i64;
            let delta = raw.clamp(-max_change, max_change);

            let old_priority = profile.priority;
            let new_priority = (old_priority + delta).clamp(PRIORITY_MIN, PRIORITY_MAX);

            if new_priority != old_priority {
                changes.push(PriorityChange {
                    engine: engine.clone(),
                    old_priority,
                    new_priority,
                    delta: new_priority - old_priority,
                    reason: format!(
                        "auto-optimization: avg rating {:.1} over {} ratings",
                        stats.avg_rating, stats.total_feedback
                    ),
                });
                stats_for_change.push((stats.avg_rating, stats.total_feedback));
            }
        }

        if changes.is_empty() {
            info!("optimization evaluated; no priority crossed the change threshold");
            return Ok(OptimizationOutcome {
                status: OptimizationStatus::NoChanges,
                changes,
                total_feedback_analyzed,
                backup_path: None,
            });
        }

        // Backup-then-atomic-save happens inside the store's exclusive
        // write section; readers see the old set or the new set, never a
        // partial one.
        let priority_updates: Vec<(String, i64)> = changes
            .iter()
            .map(|c| (c.engine.clone(), c.new_priority))
            .collect();
        let backup_path = self.profiles.apply_priorities(&priority_updates)?;

        // Append to the audit trail, one entry per applied change.
        {
            let now = SystemTime::now();
            let mut log = self.log.write().unwrap_or_else(|e| e.into_inner());
            for (change, (avg_rating, sample_count)) in changes.iter().zip(&stats_for_change) {
                log.push(OptimizationLogEntry {
                    engine_name: change.engine.clone(),
                    old_priority: change.old_priority,
                    new_priority: change.new_priority,
                    delta: change.delta,
                    reason: change.reason.clone(),
                    avg_rating: *avg_rating,
                    sample_count: *sample_count,
                    created_at: now,
                });
            }
        }

        // Any priority shift can alter future routing of cached queries.
        let invalidated = self.cache.invalidate(&InvalidationFilter::all());

        for change in &changes {
            info!(
                engine = %change.engine,
                old = change.old_priority,
                new = change.new_priority,
                "priority adjusted"
            );
        }
        info!(
            changes = changes.len(),
            invalidated, "optimization run completed"
        );

        Ok(OptimizationOutcome {
            status: OptimizationStatus::Optimized,
            changes,
            total_feedback_analyzed,
            backup_path,
        })
    }

    /// The most recent optimization log entries, newest first.
    pub fn history(&self, limit: usize) -> Vec<OptimizationLogEntry> {
        let log = self.log.read().unwrap_or_else(|e| e.into_inner());
        log.iter().rev().take(limit).cloned().collect()
    }

    /// Run [`Self::optimize`] on a fixed interval until `shutdown` fires.
    ///
    /// The first run happens one full interval after start. Errors are
    /// logged and retried on the next tick; they never stop the loop.
    pub async fn run_periodic(
        self: Arc<Self>,
        every: Duration,
        max_change: i64,
        min_feedback: usize,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() fires immediately; consume that first tick so runs
        // start one interval from now.
        ticker.tick().await;

        info!(every_secs = every.as_secs(), "optimizer scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.optimize(max_change, min_feedback) {
                        Ok(outcome) => info!(
                            status = %outcome.status,
                            changes = outcome.changes.len(),
                            "scheduled optimization run"
                        ),
                        Err(e) => warn!("scheduled optimization failed: {}; retrying next tick", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("optimizer scheduler shutting down");
                    break;
                }
            }
        }
    }
}
