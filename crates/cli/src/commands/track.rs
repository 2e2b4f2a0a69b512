//! `track` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::DeliveryStats;
use dispatcher::{create_siddi, DispatchReport};

use super::load_blueprint;
use crate::cli::TrackArgs;
use crate::session::{delivery_line, parse_properties};

/// Dispatch report for JSON output
#[derive(Serialize)]
struct TrackResult<'a> {
    event: &'a str,
    outcomes: Vec<OutcomeEntry<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deliveries: Vec<DeliveryEntry<'a>>,
}

#[derive(Serialize)]
struct OutcomeEntry<'a> {
    consumer: &'a str,
    outcome: &'static str,
}

#[derive(Serialize)]
struct DeliveryEntry<'a> {
    consumer: &'a str,
    #[serde(flatten)]
    stats: DeliveryStats,
}

/// Execute the `track` command
pub async fn run_track(args: &TrackArgs) -> Result<()> {
    let properties = parse_properties(args.props.as_deref()).context("Invalid --props")?;
    let user_properties = match args.user_props.as_deref() {
        Some(raw) => Some(parse_properties(Some(raw)).context("Invalid --user-props")?),
        None => None,
    };

    let blueprint = load_blueprint(&args.config)?;
    let siddi = create_siddi(&blueprint).context("Failed to create consumers")?;

    if let Some(user) = &args.user {
        siddi.identify(user.clone(), user_properties);
    }

    let report = siddi.track(&args.event, &properties);
    info!(event = %args.event, sent_to = ?report.sent_to(), "Event dispatched");

    // Wait for queued deliveries before reporting
    siddi.shutdown().await;
    let deliveries = siddi.delivery_stats();

    if args.json {
        let result = track_result(&args.event, &report, &deliveries);
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize dispatch report")?;
        println!("{}", json);
    } else {
        print_report(&args.event, &report, &deliveries);
    }
    Ok(())
}

fn track_result<'a>(
    event: &'a str,
    report: &'a DispatchReport,
    deliveries: &'a [(String, DeliveryStats)],
) -> TrackResult<'a> {
    TrackResult {
        event,
        outcomes: report
            .outcomes
            .iter()
            .map(|(consumer, outcome)| OutcomeEntry {
                consumer,
                outcome: outcome.as_str(),
            })
            .collect(),
        deliveries: deliveries
            .iter()
            .map(|(consumer, stats)| DeliveryEntry {
                consumer,
                stats: *stats,
            })
            .collect(),
    }
}

fn print_report(event: &str, report: &DispatchReport, deliveries: &[(String, DeliveryStats)]) {
    println!("Event: {}", event);
    if report.outcomes.is_empty() {
        println!("  (no rules configured)");
    }
    for (consumer, outcome) in &report.outcomes {
        println!("  {:<20} {}", consumer, outcome);
    }
    if !deliveries.is_empty() {
        println!("Deliveries:");
        for (consumer, stats) in deliveries {
            println!("  {}", delivery_line(consumer, stats));
        }
    }
}
