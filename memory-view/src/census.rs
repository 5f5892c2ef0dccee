// Class census: enumerate loaded classes and count their live instances
//
// Counts are fetched in consecutive batches. The suspend context is checked
// before every batch and once more before publishing; the measured latency
// of each batch becomes the alarm's next delay.

use crate::alarm::AdaptiveAlarm;
use crate::debuggee::Debuggee;
use crate::error::{MemoryViewError, Result};
use crate::model::{CensusRow, CensusSnapshot, ClassDescriptor};
use crate::suspend::SuspendContextRef;
use crate::tracking::{TrackedStrategy, TrackingRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Range;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Share of the last query's round trip to wait before the next one
pub const DELAY_COEFFICIENT: f64 = 0.5;

pub const DEFAULT_BATCH_SIZE: usize = usize::MAX;

/// Bulk-count cap for resource-constrained (Android) targets
pub const CONSTRAINED_BATCH_SIZE: usize = 500;

/// How a census ended
#[derive(Debug)]
pub enum CensusOutcome {
    Published(CensusSnapshot),
    /// No classes loaded; nothing to publish
    Empty,
    /// The suspend context changed during the walk; results discarded
    Stale,
}

pub fn adaptive_delay(elapsed: Duration) -> Duration {
    let millis = elapsed.as_millis() as f64 * DELAY_COEFFICIENT;
    Duration::from_millis(millis as u64)
}

/// Consecutive `[begin, end)` slices covering `0..len`
pub fn batch_ranges(len: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(move |begin| begin..len.min(begin.saturating_add(batch_size)))
}

pub struct ClassCensusEngine {
    batch_override: Option<usize>,
    previous_counts: Mutex<HashMap<ClassDescriptor, u64>>,
}

impl ClassCensusEngine {
    pub fn new(batch_override: Option<usize>) -> Self {
        Self {
            batch_override,
            previous_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn batch_size<D: Debuggee>(&self, debuggee: &D) -> usize {
        match self.batch_override {
            Some(size) => size.max(1),
            None if debuggee.is_resource_constrained() => CONSTRAINED_BATCH_SIZE,
            None => DEFAULT_BATCH_SIZE,
        }
    }

    /// Run one census bound to `context`
    ///
    /// `is_current` reports whether `context` is still the session's
    /// current suspend context. Any backend failure abandons the census.
    pub async fn run<D: Debuggee>(
        &self,
        debuggee: &D,
        registry: &TrackingRegistry,
        alarm: &AdaptiveAlarm,
        context: &SuspendContextRef,
        is_current: impl Fn() -> bool,
    ) -> Result<CensusOutcome> {
        let classes = debuggee.all_classes().await?;

        for (class, strategy) in registry.diff_tracked() {
            match debuggee.instances(&class, None).await {
                Ok(instances) if is_current() => strategy.update(context, instances),
                Ok(_) => debug!("Dropping instance snapshot of {} from stale context", class),
                Err(e) => warn!("Failed to snapshot instances of {}: {}", class, e),
            }
        }

        if classes.is_empty() {
            debug!("No loaded classes, nothing to publish");
            return Ok(CensusOutcome::Empty);
        }

        let batch_size = self.batch_size(debuggee);
        let mut counts = Vec::with_capacity(classes.len());
        for range in batch_ranges(classes.len(), batch_size) {
            if !is_current() {
                debug!("Suspend context changed after {} of {} classes", counts.len(), classes.len());
                return Ok(CensusOutcome::Stale);
            }

            let batch = &classes[range];
            let start = Instant::now();
            let batch_counts = debuggee.instance_counts(batch).await?;
            let elapsed = start.elapsed();

            if batch_counts.len() != batch.len() {
                return Err(MemoryViewError::Backend(format!(
                    "Instance counts returned {} values for {} classes",
                    batch_counts.len(),
                    batch.len()
                )));
            }
            counts.extend(batch_counts);

            alarm.set_delay(adaptive_delay(elapsed));
            info!(
                "Instances query time = {} ms. Count = {}",
                elapsed.as_millis(),
                batch.len()
            );
        }

        if !is_current() {
            debug!("Suspend context changed before publishing");
            return Ok(CensusOutcome::Stale);
        }

        Ok(CensusOutcome::Published(self.snapshot(registry, classes, counts)))
    }

    fn snapshot(
        &self,
        registry: &TrackingRegistry,
        classes: Vec<ClassDescriptor>,
        counts: Vec<u64>,
    ) -> CensusSnapshot {
        let mut previous = self.previous_counts.lock();
        let rows = classes
            .into_iter()
            .zip(counts)
            .map(|(class, count)| {
                let strategy = registry.strategy(&class);
                let diff = match strategy {
                    Some(TrackedStrategy::Diff(_)) => previous
                        .get(&class)
                        .map(|&before| before as i64 - count as i64),
                    _ => None,
                };
                let new_instances = strategy
                    .filter(|s| s.tracker().is_ready())
                    .map(|s| s.tracker().count());
                CensusRow {
                    class,
                    count,
                    diff,
                    new_instances,
                }
            })
            .collect::<Vec<_>>();

        *previous = rows
            .iter()
            .map(|row| (row.class.clone(), row.count))
            .collect();
        CensusSnapshot { rows }
    }
}
