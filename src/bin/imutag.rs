use std::path::PathBuf;

use anyhow::Result;
use camsnap::{read_embedded_record, EmbeddedMetadataRecord};
use chrono::{DateTime, Local};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// Print the IMU orientation embedded in captured images.
#[derive(Parser, Debug)]
#[command(name = "imutag")]
#[command(about = "Read roll/pitch/yaw embedded in camsnap images")]
struct Args {
    /// Images to inspect
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Print a JSON array instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ImageReport {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<EmbeddedMetadataRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut reports = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let report = match read_embedded_record(path).await {
            Ok(record) => ImageReport {
                path: path.display().to_string(),
                record,
                error: None,
            },
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                ImageReport {
                    path: path.display().to_string(),
                    record: None,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    if reports.iter().any(|r| r.error.is_some()) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &ImageReport) {
    println!("{}", report.path);

    if let Some(error) = &report.error {
        println!("  error: {}", error);
        return;
    }
    let Some(record) = &report.record else {
        println!("  no IMU data embedded");
        return;
    };

    println!("  roll:  {}", format_value(record.roll.as_ref()));
    println!("  pitch: {}", format_value(record.pitch.as_ref()));
    println!("  yaw:   {}", format_value(record.yaw.as_ref()));
    match record.timestamp.and_then(format_timestamp) {
        Some(when) => println!("  time:  {}", when),
        None => println!("  time:  -"),
    }
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => format!("{:.2}", f),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}

fn format_timestamp(seconds: f64) -> Option<String> {
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}
