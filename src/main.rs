//! Router demo entry point.
//!
//! Wires the profile store, dispatcher, response cache, feedback store,
//! and auto-optimizer together around a stub engine backend, then runs an
//! interactive REPL. The background optimizer ticks on its configured
//! interval; `/optimize` triggers the same pass on demand.
//!
//! Commands: `/rate <1-5> [comment]`, `/optimize`, `/report`, `/stats`,
//! `/priorities`, `/quit`.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

mod backend;
mod cache;
mod config;
mod error;
mod feedback;
mod optimizer;
mod profiles;
mod router;
mod signals;
mod types;

use backend::{EngineBackend, StubBackend};
use cache::ResponseCache;
use config::load_config;
use feedback::FeedbackStore;
use optimizer::AutoOptimizer;
use profiles::{default_profiles, EngineProfileStore, FileStorage};
use router::Router;
use types::{GenerationParams, RoutingDecision};

#[tokio::main]
async fn main() {
    // Initialise structured logging — default level WARN to keep output clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    // Load configuration from .env / system environment.
    let cfg = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Please check your .env file. See .env.example for available variables.");
            std::process::exit(1);
        }
    };

    println!("🔀 Engine router starting...");
    println!("   Profiles: {}", cfg.profile_path.display());
    println!("   Cache TTL: {} days", cfg.cache_ttl_days);

    // Profile store — seed a default set on first run so the REPL works
    // out of the box.
    let store = Arc::new(EngineProfileStore::open(Box::new(FileStorage::new(
        &cfg.profile_path,
    ))));
    if store.is_empty() {
        if let Some(parent) = cfg.profile_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match store.seed(default_profiles()) {
            Ok(()) => println!("   Seeded default engine profiles"),
            Err(e) => {
                eprintln!("Cannot seed engine profiles: {}", e);
                std::process::exit(1);
            }
        }
    }

    let dispatcher = Router::new(Arc::clone(&store));
    let cache = Arc::new(ResponseCache::new(cfg.cache_ttl_days));
    let feedback = Arc::new(FeedbackStore::new());
    let optimizer = Arc::new(AutoOptimizer::new(
        Arc::clone(&store),
        Arc::clone(&feedback),
        Arc::clone(&cache),
        cfg.feedback_window_days,
    ));
    let engine_backend = StubBackend;

    // Background optimization on a fixed interval, cancelled at shutdown.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler = tokio::spawn(Arc::clone(&optimizer).run_periodic(
        Duration::from_secs(cfg.optimize_interval_hours * 3600),
        cfg.optimize_max_change,
        cfg.optimize_min_feedback,
        shutdown_rx,
    ));

    println!("💬 Type a request (/quit to exit)\n");

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut last_message_id: Option<String> = None;

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush().unwrap_or_default();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "/quit" || input == "/exit" {
                    break;
                }

                if let Some(rest) = input.strip_prefix("/rate") {
                    handle_rate(rest, &feedback, &session_id, last_message_id.as_deref());
                    continue;
                }
                match input {
                    "/optimize" => {
                        handle_optimize(&optimizer, &cfg);
                        continue;
                    }
                    "/report" => {
                        handle_report(&feedback, cfg.feedback_window_days);
                        continue;
                    }
                    "/stats" => {
                        println!("{:#?}\n", cache.stats());
                        continue;
                    }
                    "/priorities" => {
                        for (engine, priority) in store.current_priorities() {
                            println!("  {:12} {}", engine, priority);
                        }
                        println!();
                        continue;
                    }
                    _ => {}
                }

                last_message_id = handle_request(
                    input,
                    &dispatcher,
                    &cache,
                    &feedback,
                    &engine_backend,
                    &session_id,
                )
                .or(last_message_id);
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }

    // Stop the scheduler before exiting.
    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;

    println!("\n👋 Goodbye!");
}

/// Route → cache lookup → generate on miss → cache store → register for
/// feedback. Returns the registered message id when a response was produced.
fn handle_request(
    input: &str,
    dispatcher: &Router,
    cache: &ResponseCache,
    feedback: &FeedbackStore,
    engine_backend: &dyn EngineBackend,
    session_id: &str,
) -> Option<String> {
    let params = GenerationParams::default();

    let decision = match dispatcher.route(input, false) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("❌ {}\n", e);
            return None;
        }
    };

    match decision {
        RoutingDecision::NeedsClarification { prompt } => {
            println!("🤔 {}\n", prompt);
            None
        }
        RoutingDecision::Ok {
            engine,
            confidence,
            reasoning,
            alternatives,
        } => {
            println!("→ {} (confidence {}, {})", engine, confidence, reasoning);
            if !alternatives.is_empty() {
                let alts: Vec<String> = alternatives
                    .iter()
                    .map(|a| format!("{}:{}", a.engine, a.score))
                    .collect();
                println!("  alternatives: {}", alts.join(", "));
            }

            let text = match cache.lookup(input, &engine, &params) {
                Some(hit) => {
                    println!("  (cached, hit #{})", hit.hit_count);
                    hit.response["text"].as_str().unwrap_or_default().to_string()
                }
                None => match engine_backend.generate(&engine, input, &params) {
                    Ok(text) => {
                        cache.store(
                            input,
                            &engine,
                            &params,
                            &serde_json::json!({ "text": text }),
                            serde_json::json!({}),
                        );
                        text
                    }
                    Err(e) => {
                        eprintln!("❌ Engine call failed: {}\n", e);
                        return None;
                    }
                },
            };

            println!("\n{}\n", text);
            Some(feedback.register_message(session_id, &engine, &text))
        }
    }
}

/// `/rate <1-5> [comment]` applies to the most recent response.
fn handle_rate(
    args: &str,
    feedback: &FeedbackStore,
    session_id: &str,
    last_message_id: Option<&str>,
) {
    let Some(message_id) = last_message_id else {
        println!("Nothing to rate yet.\n");
        return;
    };

    let mut parts = args.trim().splitn(2, ' ');
    let rating = parts.next().and_then(|r| r.parse::<u8>().ok());
    let comment = parts.next().map(str::trim).filter(|c| !c.is_empty());

    let Some(rating) = rating else {
        println!("Usage: /rate <1-5> [comment]\n");
        return;
    };

    match feedback.record_feedback(message_id, session_id, rating, comment) {
        Ok(_) => println!("✅ Feedback recorded\n"),
        Err(e) => println!("❌ {}\n", e),
    }
}

fn handle_optimize(optimizer: &AutoOptimizer, cfg: &config::Config) {
    match optimizer.optimize(cfg.optimize_max_change, cfg.optimize_min_feedback) {
        Ok(outcome) => {
            println!("Status: {}", outcome.status);
            for change in &outcome.changes {
                println!(
                    "  {}: {} → {} ({})",
                    change.engine, change.old_priority, change.new_priority, change.reason
                );
            }
            println!();
        }
        Err(e) => println!("❌ Optimization failed: {}\n", e),
    }
}

fn handle_report(feedback: &FeedbackStore, window_days: u64) {
    let report = feedback.analyze_performance(window_days);
    println!(
        "Feedback over the last {} days: {} records",
        report.period_days, report.total_feedback
    );
    for (engine, stats) in &report.engine_performance {
        println!(
            "  {:12} avg {:.2} over {} ({} good / {} bad)",
            engine, stats.avg_rating, stats.total_feedback, stats.good_ratings, stats.bad_ratings
        );
    }
    for suggestion in &report.suggestions {
        println!("  💡 {}", suggestion);
    }
    println!();
}
