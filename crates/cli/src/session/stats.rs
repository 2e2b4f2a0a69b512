//! Session statistics.

use std::time::Duration;

use contracts::DeliveryStats;
use observability::DispatchMetricsAggregator;

/// Statistics from a replay run
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Script lines read, including skipped ones
    pub lines_read: u64,

    /// Lines that failed to parse
    pub lines_rejected: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Dispatch outcome aggregator
    pub dispatch: DispatchMetricsAggregator,

    /// Background delivery counters per queued consumer, filled after shutdown
    pub deliveries: Vec<(String, DeliveryStats)>,
}

impl SessionStats {
    /// Tracked events per second
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.dispatch.total_events as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Replay Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Lines read: {}", self.lines_read);
        println!("Lines rejected: {}", self.lines_rejected);
        println!("Events/s: {:.2}", self.events_per_sec());
        println!();
        print!("{}", self.dispatch.summary());
        println!();
        if !self.deliveries.is_empty() {
            println!("Deliveries:");
            for (consumer, stats) in &self.deliveries {
                println!("  {}", delivery_line(consumer, stats));
            }
            println!();
        }
    }

    /// Failed or dropped deliveries across all consumers
    pub fn lost_deliveries(&self) -> u64 {
        self.deliveries
            .iter()
            .map(|(_, s)| s.failed + s.dropped)
            .sum()
    }
}

/// One summary row of a consumer's delivery counters
pub fn delivery_line(consumer: &str, stats: &DeliveryStats) -> String {
    format!(
        "{:<20} delivered={} failed={} dropped={}",
        consumer, stats.delivered, stats.failed, stats.dropped
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_per_sec() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.events_per_sec(), 0.0);

        stats.dispatch.update([("console", "sent")], 1.0);
        stats.dispatch.update([("console", "sent")], 1.0);
        stats.duration = Duration::from_secs(2);
        assert!((stats.events_per_sec() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_lost_deliveries() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.lost_deliveries(), 0);

        stats.deliveries = vec![
            (
                "archive".to_string(),
                DeliveryStats {
                    delivered: 5,
                    failed: 1,
                    ..Default::default()
                },
            ),
            (
                "amplitude".to_string(),
                DeliveryStats {
                    dropped: 2,
                    ..Default::default()
                },
            ),
        ];
        assert_eq!(stats.lost_deliveries(), 3);
        assert_eq!(
            delivery_line("archive", &stats.deliveries[0].1),
            format!("{:<20} delivered=5 failed=1 dropped=0", "archive")
        );
    }
}
