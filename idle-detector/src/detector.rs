use std::sync::Arc;

use dispatch_core::{HostController, JobRegistry, WorkQueue};
use eyre::Result;
use tracing::{info, warn};

const QUEUE_DEPTH_GAUGE: &str = "idle_detector_queue_depth";
const CONSECUTIVE_IDLE_GAUGE: &str = "idle_detector_consecutive_idle_samples";
const STOP_CALLS: &str = "idle_detector_stop_calls_total";
const REAPED_COUNT: &str = "idle_detector_reaped_records_total";

/// C6: samples `WorkQueue::visible_depth` on a fixed cadence and invokes
/// `HostController::stop` once N consecutive samples are at or below the threshold.
///
/// Idempotency of repeated fires is not this type's concern - it calls `stop()` every
/// time the window condition holds, and relies on `HostController` to no-op a stop
/// issued against a host that isn't `Running` (spec.md §8 property 8).
pub struct IdleDetector {
    queue: WorkQueue,
    registry: JobRegistry,
    host: Arc<dyn HostController>,
    threshold: i64,
    periods: usize,
    consecutive_idle: usize,
}

impl IdleDetector {
    pub fn new(
        queue: WorkQueue,
        registry: JobRegistry,
        host: Arc<dyn HostController>,
        threshold: i64,
        periods: usize,
    ) -> Self {
        Self {
            queue,
            registry,
            host,
            threshold,
            periods,
            consecutive_idle: 0,
        }
    }

    /// One sampling tick: read the depth gauge, update the idle streak, fire a stop
    /// if the streak has reached `periods`, and reap TTL-expired records.
    pub async fn sample_once(&mut self) -> Result<()> {
        let depth = self.queue.visible_depth().await?;

        let labels: &[(String, String)] = &[];
        common_metrics::gauge(QUEUE_DEPTH_GAUGE, labels, depth as f64);

        if depth <= self.threshold {
            self.consecutive_idle += 1;
        } else {
            self.consecutive_idle = 0;
        }
        common_metrics::gauge(CONSECUTIVE_IDLE_GAUGE, labels, self.consecutive_idle as f64);

        if self.consecutive_idle >= self.periods {
            info!(
                depth,
                consecutive = self.consecutive_idle,
                "queue idle for the configured window, stopping host"
            );
            if let Err(e) = self.host.stop().await {
                warn!(error = %e, "failed to stop host");
            } else {
                common_metrics::inc(STOP_CALLS, labels, 1);
            }
        }

        match self.registry.reap_expired().await {
            Ok(0) => {}
            Ok(n) => {
                common_metrics::inc(REAPED_COUNT, labels, n);
                info!(reaped = n, "reaped TTL-expired job records");
            }
            Err(e) => warn!(error = %e, "failed to reap expired job records"),
        }

        Ok(())
    }
}
