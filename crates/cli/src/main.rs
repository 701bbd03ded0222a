//! Loadwatch CLI
//!
//! A command-line tool for sending samples to the analytics service,
//! inspecting its analysis and health, and generating synthetic load.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, load, samples};
use std::time::Duration;

/// Loadwatch CLI
#[derive(Parser)]
#[command(name = "lwctl")]
#[command(author, version, about = "CLI for the Loadwatch analytics service", long_about = None)]
pub struct Cli {
    /// Service URL (can also be set via LOADWATCH_API_URL env var)
    #[arg(long, env = "LOADWATCH_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single load sample
    Send {
        /// CPU utilization percent
        #[arg(long)]
        cpu: f64,

        /// Requests per second
        #[arg(long)]
        rps: f64,

        /// Unix timestamp (defaults to arrival time on the service)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Show the rolling average and anomaly detector statistics
    Analyze,

    /// Show service health
    Health,

    /// Generate synthetic load against the service
    Load {
        /// How long to generate load, in seconds
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,

        /// Number of concurrent workers
        #[arg(long, short, default_value_t = 4)]
        concurrency: usize,

        /// Minimum wait between actions, in milliseconds
        #[arg(long, default_value_t = 100)]
        min_wait_ms: u64,

        /// Maximum wait between actions, in milliseconds
        #[arg(long, default_value_t = 500)]
        max_wait_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url, Duration::from_secs(cli.timeout_secs))?;

    match cli.command {
        Commands::Send {
            cpu,
            rps,
            timestamp,
        } => {
            samples::send_sample(&client, cpu, rps, timestamp, cli.format).await?;
        }
        Commands::Analyze => {
            samples::show_analysis(&client, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
        Commands::Load {
            duration_secs,
            concurrency,
            min_wait_ms,
            max_wait_ms,
        } => {
            let options = load::LoadOptions {
                duration: Duration::from_secs(duration_secs),
                concurrency,
                min_wait: Duration::from_millis(min_wait_ms),
                max_wait: Duration::from_millis(max_wait_ms),
            };
            load::run_load(client, options, cli.format).await?;
        }
    }

    Ok(())
}
