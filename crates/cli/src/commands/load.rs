//! Synthetic load generator
//!
//! Each worker repeatedly picks a weighted action (send a normal sample,
//! send an anomalous sample, fetch the analysis, check health) and waits
//! a random 100-500 ms between actions.

use anyhow::Result;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::client::{ApiClient, SampleRequest};
use crate::output::{print_info, print_json, print_success, print_warning, OutputFormat};

/// Relative weights: normal samples, anomalous samples, analyze, health
const ACTION_WEIGHTS: [(Action, u32); 4] = [
    (Action::SendNormal, 3),
    (Action::SendAnomaly, 1),
    (Action::Analyze, 1),
    (Action::Health, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    SendNormal,
    SendAnomaly,
    Analyze,
    Health,
}

/// Load generation parameters
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub duration: Duration,
    pub concurrency: usize,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

#[derive(Debug, Default)]
struct LoadCounters {
    samples_sent: AtomicU64,
    anomalies_sent: AtomicU64,
    flagged: AtomicU64,
    reads: AtomicU64,
    failures: AtomicU64,
}

/// Summary printed at the end of a run
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub duration_secs: f64,
    pub samples_sent: u64,
    pub anomalies_sent: u64,
    pub flagged_by_service: u64,
    pub reads: u64,
    pub failures: u64,
    pub samples_per_sec: f64,
}

impl LoadCounters {
    fn summary(&self, elapsed: Duration) -> LoadSummary {
        let samples_sent = self.samples_sent.load(Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();
        LoadSummary {
            duration_secs: secs,
            samples_sent,
            anomalies_sent: self.anomalies_sent.load(Ordering::Relaxed),
            flagged_by_service: self.flagged.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            samples_per_sec: if secs > 0.0 {
                samples_sent as f64 / secs
            } else {
                0.0
            },
        }
    }
}

fn pick_action(rng: &mut impl Rng) -> Action {
    let total: u32 = ACTION_WEIGHTS.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (action, weight) in ACTION_WEIGHTS {
        if roll < weight {
            return action;
        }
        roll -= weight;
    }
    Action::SendNormal
}

/// Build a sample; anomalous ones carry a very high request rate
fn generate_sample(rng: &mut impl Rng, anomalous: bool) -> SampleRequest {
    let rps = if anomalous {
        rng.gen_range(5000.0..10000.0)
    } else {
        rng.gen_range(100.0..2000.0)
    };

    SampleRequest {
        timestamp: chrono::Utc::now().timestamp(),
        cpu: rng.gen_range(10.0..90.0),
        rps,
    }
}

async fn run_worker(
    client: Arc<ApiClient>,
    counters: Arc<LoadCounters>,
    options: LoadOptions,
    deadline: Instant,
) {
    let mut rng = StdRng::from_entropy();

    while Instant::now() < deadline {
        match pick_action(&mut rng) {
            action @ (Action::SendNormal | Action::SendAnomaly) => {
                let anomalous = action == Action::SendAnomaly;
                let sample = generate_sample(&mut rng, anomalous);
                match client.send_sample(&sample).await {
                    Ok(response) => {
                        counters.samples_sent.fetch_add(1, Ordering::Relaxed);
                        if anomalous {
                            counters.anomalies_sent.fetch_add(1, Ordering::Relaxed);
                        }
                        if response.is_anomaly {
                            counters.flagged.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(_) => {
                        counters.failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Action::Analyze => record_read(&counters, client.analyze().await.is_ok()),
            Action::Health => record_read(&counters, client.health().await.is_ok()),
        }

        let wait_ms = rng.gen_range(options.min_wait.as_millis()..=options.max_wait.as_millis());
        tokio::time::sleep(Duration::from_millis(wait_ms as u64)).await;
    }
}

fn record_read(counters: &LoadCounters, ok: bool) {
    if ok {
        counters.reads.fetch_add(1, Ordering::Relaxed);
    } else {
        counters.failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Drive synthetic load against the service and report what happened
pub async fn run_load(client: ApiClient, options: LoadOptions, format: OutputFormat) -> Result<()> {
    let concurrency = options.concurrency.max(1);
    if options.min_wait > options.max_wait {
        anyhow::bail!("minimum wait must not exceed maximum wait");
    }

    print_info(&format!(
        "Generating load for {}s with {} workers",
        options.duration.as_secs(),
        concurrency
    ));

    let client = Arc::new(client);
    let counters = Arc::new(LoadCounters::default());
    let started = Instant::now();
    let deadline = started + options.duration;

    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            tokio::spawn(run_worker(
                Arc::clone(&client),
                Arc::clone(&counters),
                options.clone(),
                deadline,
            ))
        })
        .collect();

    for handle in handles {
        handle.await?;
    }

    let summary = counters.summary(started.elapsed());

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            println!("{}", "Load Summary".bold());
            println!("{}", "=".repeat(40));
            println!("Samples sent:       {}", summary.samples_sent);
            println!("  of which anomalous: {}", summary.anomalies_sent);
            println!("Flagged by service: {}", summary.flagged_by_service);
            println!("Reads:              {}", summary.reads);
            println!("Samples/sec:        {:.2}", summary.samples_per_sec);

            if summary.failures > 0 {
                print_warning(&format!("{} requests failed", summary.failures));
            } else {
                print_success("All requests succeeded");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_weights_are_respected() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut normal = 0;
        let trials = 6000;

        for _ in 0..trials {
            if pick_action(&mut rng) == Action::SendNormal {
                normal += 1;
            }
        }

        // Expected share is 3/6
        let share = normal as f64 / trials as f64;
        assert!((share - 0.5).abs() < 0.05, "share was {}", share);
    }

    #[test]
    fn test_generated_sample_ranges() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let normal = generate_sample(&mut rng, false);
            assert!((100.0..2000.0).contains(&normal.rps));
            assert!((10.0..90.0).contains(&normal.cpu));

            let spike = generate_sample(&mut rng, true);
            assert!((5000.0..10000.0).contains(&spike.rps));
        }
    }

    #[test]
    fn test_summary_rate() {
        let counters = LoadCounters::default();
        counters.samples_sent.store(50, Ordering::Relaxed);

        let summary = counters.summary(Duration::from_secs(10));
        assert_eq!(summary.samples_per_sec, 5.0);

        let empty = LoadCounters::default().summary(Duration::ZERO);
        assert_eq!(empty.samples_per_sec, 0.0);
    }
}
