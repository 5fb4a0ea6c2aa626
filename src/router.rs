//! Request dispatcher — scores every registered engine against the
//! extracted signals and picks a winner.
//!
//! Scoring is an ordered rule table: for a given engine, the FIRST rule
//! whose predicate matches the signals adjusts the engine's base priority
//! and terminates evaluation. The order is a deliberate tie-break policy —
//! architecture/scale concerns dominate pure code concerns, which dominate
//! debug-only concerns. Unmatched engines keep their base priority.
//!
//! The dispatcher never fails for normal input: a mis-populated profile
//! set degrades to an empty alternatives list. The single error case is an
//! empty profile store, which is a configuration problem the caller must
//! surface, not swallow.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{
    ARCHITECTURE_BONUS, ARCHITECTURE_PENALTY, CODEGEN_BONUS, CODEGEN_OVERKILL_PENALTY,
    COMPLEX_BONUS, COMPLEX_PENALTY, DEBUG_BONUS, DEBUG_OVERKILL_PENALTY, SHORT_QUERY_BONUS,
    SHORT_REASONING_PENALTY, SHORT_VISION_PENALTY, STRATEGY_CODE_BONUS, STRATEGY_CODE_PENALTY,
};
use crate::error::RouterError;
use crate::profiles::{EngineProfile, EngineProfileStore, CAP_CODE, CAP_REASONING, CAP_VISION};
use crate::signals;
use crate::types::{RoutingDecision, ScoredEngine, Signals};

/// Phrases too vague to route; the user is asked to elaborate instead.
const VAGUE_HELP_PHRASES: &[&str] = &["ayudame", "ayúdame", "ayuda", "help"];

/// Clarification prompt for vague-help requests.
const CLARIFY_PROMPT: &str = "Could you give me more detail about what you need?";

/// Clarification prompt for single-word, non-question messages.
const CLARIFY_PROMPT_SHORT: &str = "Could you give me more detail?";

// ── Rule table ────────────────────────────────────────────────────────────────

/// One entry in the ordered scoring-rule chain.
///
/// `applies` is evaluated against the request signals; when it matches,
/// `adjust` produces the score delta for a given engine and no further
/// rules are consulted for that request.
pub struct ScoringRule {
    pub name: &'static str,
    pub applies: fn(&Signals) -> bool,
    pub adjust: fn(&EngineProfile) -> i64,
}

/// The rule chain, highest precedence first.
pub const RULES: &[ScoringRule] = &[
    ScoringRule {
        name: "architecture",
        applies: |s| s.mentions_architecture,
        adjust: |p| {
            if p.has_capability(CAP_REASONING) {
                ARCHITECTURE_BONUS
            } else {
                -ARCHITECTURE_PENALTY
            }
        },
    },
    ScoringRule {
        name: "strategy_and_codegen",
        applies: |s| s.mentions_strategy && s.wants_code_generation,
        adjust: |p| {
            if p.has_capability(CAP_REASONING) {
                STRATEGY_CODE_BONUS
            } else {
                -STRATEGY_CODE_PENALTY
            }
        },
    },
    ScoringRule {
        name: "code_generation",
        applies: |s| s.wants_code_generation || s.mentions_code,
        adjust: |p| {
            if p.has_capability(CAP_CODE) {
                CODEGEN_BONUS
            } else if p.has_capability(CAP_REASONING) {
                -CODEGEN_OVERKILL_PENALTY
            } else {
                0
            }
        },
    },
    ScoringRule {
        name: "debugging",
        applies: |s| s.mentions_debug,
        adjust: |p| {
            if p.has_capability(CAP_CODE) {
                DEBUG_BONUS
            } else if p.has_capability(CAP_REASONING) {
                -DEBUG_OVERKILL_PENALTY
            } else {
                0
            }
        },
    },
    ScoringRule {
        name: "complex_analysis",
        applies: |s| s.mentions_complex && !s.mentions_code && !s.mentions_image,
        adjust: |p| {
            if p.has_capability(CAP_REASONING) {
                COMPLEX_BONUS
            } else if p.has_capability(CAP_CODE) {
                -COMPLEX_PENALTY
            } else {
                0
            }
        },
    },
    ScoringRule {
        name: "short_query",
        applies: |s| s.is_short || s.is_question,
        adjust: |p| {
            if p.has_capability(CAP_VISION) {
                -SHORT_VISION_PENALTY
            } else if p.has_capability(CAP_REASONING) {
                -SHORT_REASONING_PENALTY
            } else {
                SHORT_QUERY_BONUS
            }
        },
    },
];

/// Score one engine: base priority plus the first matching rule's delta.
pub fn score_engine(profile: &EngineProfile, signals: &Signals) -> i64 {
    for rule in RULES {
        if (rule.applies)(signals) {
            return profile.priority + (rule.adjust)(profile);
        }
    }
    profile.priority
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Stateless dispatcher over a shared profile store.
pub struct Router {
    profiles: Arc<EngineProfileStore>,
}

impl Router {
    pub fn new(profiles: Arc<EngineProfileStore>) -> Self {
        Self { profiles }
    }

    /// Route a request to an engine, or ask for clarification.
    ///
    /// # Errors
    /// [`RouterError::Configuration`] when no engines are registered.
    pub fn route(&self, text: &str, has_image: bool) -> Result<RoutingDecision, RouterError> {
        let engines = self.profiles.snapshot();
        if engines.is_empty() {
            return Err(RouterError::Configuration(
                "no engines registered in the profile store".to_string(),
            ));
        }

        // Attached image: route straight to the strongest vision engine,
        // bypassing all text scoring.
        if has_image {
            if let Some(decision) = self.route_image(&engines) {
                return Ok(decision);
            }
            warn!("image attached but no vision-capable engine registered; falling back to text scoring");
        }

        let signals = signals::extract(text);
        debug!(?signals, "signals extracted");

        // Vague or single-word requests are clarified, not routed; the
        // caller must not charge these to any engine's statistics.
        let lower = text.to_lowercase();
        if VAGUE_HELP_PHRASES.iter().any(|p| lower.contains(p)) {
            info!("needs clarification: vague help phrase");
            return Ok(RoutingDecision::NeedsClarification {
                prompt: CLARIFY_PROMPT.to_string(),
            });
        }
        if text.split_whitespace().count() <= 1 && !signals.is_question {
            info!("needs clarification: single token without question marker");
            return Ok(RoutingDecision::NeedsClarification {
                prompt: CLARIFY_PROMPT_SHORT.to_string(),
            });
        }

        // Score every engine, then sort by score; ties fall back to the
        // declared base priority, then to stable name order.
        let mut scored: Vec<(EngineProfile, i64)> = engines
            .into_iter()
            .map(|p| {
                let score = score_engine(&p, &signals);
                (p, score)
            })
            .collect();
        scored.sort_by(|(pa, sa), (pb, sb)| {
            sb.cmp(sa)
                .then(pb.priority.cmp(&pa.priority))
                .then(pa.name.cmp(&pb.name))
        });

        let (winner, winner_score) = &scored[0];
        let alternatives: Vec<ScoredEngine> = scored[1..]
            .iter()
            .take(2)
            .map(|(p, s)| ScoredEngine {
                engine: p.name.clone(),
                score: *s,
            })
            .collect();

        // Monotonic in the winner's score, floored at 50: there is always
        // *some* basis for the choice.
        let confidence = (50 + (winner_score - 50)).clamp(50, 100) as u8;

        let active = signals.active_names();
        let reasoning = if active.is_empty() {
            "no active signals".to_string()
        } else {
            active.join(", ")
        };

        info!(
            engine = %winner.name,
            score = winner_score,
            confidence,
            "routing decision"
        );

        Ok(RoutingDecision::Ok {
            engine: winner.name.clone(),
            confidence,
            reasoning,
            alternatives,
        })
    }

    /// Pick the highest-priority vision engine; ties broken by name.
    fn route_image(&self, engines: &[EngineProfile]) -> Option<RoutingDecision> {
        let winner = engines
            .iter()
            .filter(|p| p.has_capability(CAP_VISION))
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.name.cmp(&a.name)))?;

        info!(engine = %winner.name, "routing image request");
        Some(RoutingDecision::Ok {
            engine: winner.name.clone(),
            confidence: 100,
            reasoning: "image attached".to_string(),
            alternatives: Vec::new(),
        })
    }
}
