//! Sample ingestion and analysis commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, SampleRequest};
use crate::output::{format_anomaly, format_rate, format_timestamp, print_json, OutputFormat};

/// Row for the analysis table
#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Statistic")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Send a single sample and show the service's verdict
pub async fn send_sample(
    client: &ApiClient,
    cpu: f64,
    rps: f64,
    timestamp: Option<i64>,
    format: OutputFormat,
) -> Result<()> {
    let sample = SampleRequest {
        timestamp: timestamp.unwrap_or(0),
        cpu,
        rps,
    };

    let response = client.send_sample(&sample).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            println!(
                "rps={} rolling_average={} verdict={}",
                format_rate(rps).cyan(),
                format_rate(response.rolling_average).cyan(),
                format_anomaly(response.is_anomaly)
            );
        }
    }

    Ok(())
}

/// Show the current rolling average and detector statistics
pub async fn show_analysis(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.analyze().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Load Analysis".bold());
            println!("{}", "=".repeat(40));
            println!("As of: {}", format_timestamp(report.timestamp).cyan());
            println!();

            let stats = &report.anomaly_stats;
            let rows = vec![
                StatRow {
                    name: "Rolling average",
                    value: format_rate(report.rolling_average),
                },
                StatRow {
                    name: "Detector mean",
                    value: format_rate(stats.mean),
                },
                StatRow {
                    name: "Detector std dev",
                    value: format_rate(stats.std_dev),
                },
                StatRow {
                    name: "Z-score threshold",
                    value: format_rate(stats.threshold),
                },
                StatRow {
                    name: "Samples in window",
                    value: stats.window_size.to_string(),
                },
            ];

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
