//! Feed a script through a `Siddi`.

use std::time::Instant;

use anyhow::{Context, Result};
use dispatcher::Siddi;
use observability::record_track_latency_us;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, instrument, warn};

use super::script::ScriptEntry;
use super::stats::SessionStats;

/// Run every entry of `reader` in order
///
/// Malformed lines are logged and counted, never fatal.
#[instrument(name = "session_run_script", skip_all)]
pub async fn run_script<R>(siddi: &Siddi, reader: R) -> Result<SessionStats>
where
    R: AsyncBufRead + Unpin,
{
    let started = Instant::now();
    let mut stats = SessionStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("failed to read script")? {
        stats.lines_read += 1;

        let entry = match ScriptEntry::parse_line(&line) {
            None => continue,
            Some(Ok(entry)) => entry,
            Some(Err(e)) => {
                stats.lines_rejected += 1;
                warn!(line = stats.lines_read, error = %e, "Skipping script line");
                continue;
            }
        };

        match entry {
            ScriptEntry::Identify {
                user_id,
                properties,
            } => {
                siddi.identify(user_id, properties);
                stats.dispatch.record_identify();
            }
            ScriptEntry::Track { event, properties } => {
                let call = Instant::now();
                let report = siddi.track(&event, &properties);
                let latency_us = call.elapsed().as_secs_f64() * 1e6;

                record_track_latency_us(latency_us);
                stats.dispatch.update(
                    report
                        .outcomes
                        .iter()
                        .map(|(consumer, outcome)| (consumer.as_str(), outcome.as_str())),
                    latency_us,
                );
                debug!(event = %event, sent_to = ?report.sent_to(), "Event dispatched");
            }
        }
    }

    stats.duration = started.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ConsumerRule;
    use dispatcher::{ConsumerRegistry, MockConsumer};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_script() {
        let mock = Arc::new(MockConsumer::new("A"));
        let siddi = Siddi::new(
            vec![ConsumerRule::new("A").with_deny(["site.login."])],
            ConsumerRegistry::new().with(mock.clone()),
        );

        let script = br#"
# session start
{"identify": {"user_id": "u1"}}
{"track": {"event": "site.login.success"}}
{"track": {"event": "document.create", "properties": {"value1": 1}}}
not json
"#;
        let stats = run_script(&siddi, &script[..]).await.unwrap();

        assert_eq!(stats.lines_rejected, 1);
        assert_eq!(stats.dispatch.total_identifies, 1);
        assert_eq!(stats.dispatch.total_events, 2);
        assert_eq!(stats.dispatch.events_delivered, 1);
        assert_eq!(stats.dispatch.outcome_counts["A"]["filtered"], 1);
        assert_eq!(mock.identified().len(), 1);
        assert_eq!(mock.tracked().len(), 1);
    }
}
