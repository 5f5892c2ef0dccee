// Class -> tracking strategy maps
//
// Written only by the command worker, read by the presentation side
// without further locking. A class is in at most one of the two maps.

use super::{ConstructorInstanceTracker, InstanceTrackingStrategy, TrackerForNewInstances};
use crate::debuggee::Debuggee;
use crate::error::Result;
use crate::model::{ClassDescriptor, TrackingType};
use crate::scheduler::assert_worker;
use crate::suspend::SuspendContextRef;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub enum TrackedStrategy {
    Diff(Arc<InstanceTrackingStrategy>),
    Creation(Arc<ConstructorInstanceTracker>),
}

impl TrackedStrategy {
    pub fn tracking_type(&self) -> TrackingType {
        match self {
            TrackedStrategy::Diff(_) => TrackingType::DiffTracked,
            TrackedStrategy::Creation(_) => TrackingType::CreationTracked,
        }
    }

    pub fn tracker(&self) -> &dyn TrackerForNewInstances {
        match self {
            TrackedStrategy::Diff(strategy) => strategy.as_ref(),
            TrackedStrategy::Creation(tracker) => tracker.as_ref(),
        }
    }
}

#[derive(Default)]
pub struct TrackingRegistry {
    diff: DashMap<ClassDescriptor, Arc<InstanceTrackingStrategy>>,
    creation: DashMap<ClassDescriptor, Arc<ConstructorInstanceTracker>>,
    disposed: AtomicBool,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `tracking` for `class`, replacing whatever tracked it before
    ///
    /// `is_current` is checked once the backend has answered; a stale or
    /// failed request leaves the existing strategy in place. Returns
    /// whether a new strategy was installed.
    pub async fn track_class<D: Debuggee>(
        &self,
        debuggee: &D,
        class: ClassDescriptor,
        tracking: TrackingType,
        context: Option<SuspendContextRef>,
        is_current: impl Fn() -> bool,
    ) -> Result<bool> {
        assert_worker("track_class")?;

        match tracking {
            TrackingType::CreationTracked => {
                let feed = debuggee.watch_creations(&class).await?;
                let tracker = Arc::new(ConstructorInstanceTracker::new(class.clone(), feed));
                if !is_current() {
                    debug!("Dropping creation tracker for {} from stale context", class);
                    tracker.dispose();
                    return Ok(false);
                }

                self.dispose_creation(&class);
                self.diff.remove(&class);
                info!("Tracking creations of {}", class);
                Ok(self.admit_creation(class, tracker))
            }
            TrackingType::DiffTracked => {
                let baseline = debuggee.instances(&class, None).await?;
                if !is_current() {
                    debug!("Dropping instance baseline of {} from stale context", class);
                    return Ok(false);
                }
                if self.is_disposed() {
                    return Ok(false);
                }

                self.dispose_creation(&class);
                info!("Tracking {} live instances of {}", baseline.len(), class);
                let strategy = InstanceTrackingStrategy::new(class.clone(), context, baseline);
                self.diff.insert(class, Arc::new(strategy));
                Ok(true)
            }
        }
    }

    // dispose_all may run concurrently; whichever side sees the other
    // disposes the tracker
    fn admit_creation(&self, class: ClassDescriptor, tracker: Arc<ConstructorInstanceTracker>) -> bool {
        self.creation.insert(class.clone(), Arc::clone(&tracker));
        if self.is_disposed() {
            self.creation.remove(&class);
            tracker.dispose();
            return false;
        }
        true
    }

    fn dispose_creation(&self, class: &ClassDescriptor) {
        if let Some((_, old)) = self.creation.remove(class) {
            old.dispose();
        }
    }

    /// Diff strategy first, then creation tracker
    pub fn strategy(&self, class: &ClassDescriptor) -> Option<TrackedStrategy> {
        if let Some(strategy) = self.diff.get(class) {
            return Some(TrackedStrategy::Diff(Arc::clone(strategy.value())));
        }
        self.creation
            .get(class)
            .map(|tracker| TrackedStrategy::Creation(Arc::clone(tracker.value())))
    }

    pub fn is_tracking_active(&self, class: &ClassDescriptor) -> bool {
        self.strategy(class)
            .is_some_and(|strategy| strategy.tracker().is_ready())
    }

    pub fn is_diff_tracked(&self, class: &ClassDescriptor) -> bool {
        self.diff.contains_key(class)
    }

    /// Drop every diff-tracked class with this name; returns how many went
    pub fn remove_diff_tracked_by_name(&self, name: &str) -> Result<usize> {
        assert_worker("remove_diff_tracked_by_name")?;

        let before = self.diff.len();
        self.diff.retain(|class, _| class.name() != name);
        let removed = before.saturating_sub(self.diff.len());
        debug!("Removed {} diff-tracked classes named {}", removed, name);
        Ok(removed)
    }

    pub fn diff_tracked(&self) -> Vec<(ClassDescriptor, Arc<InstanceTrackingStrategy>)> {
        self.diff
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn creation_trackers(&self) -> Vec<Arc<ConstructorInstanceTracker>> {
        self.creation
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn mark_creation_obsolete(&self) {
        for tracker in self.creation_trackers() {
            tracker.obsolete();
        }
    }

    pub fn commit_creation(&self) {
        for tracker in self.creation_trackers() {
            tracker.commit_tracked();
        }
    }

    pub fn len(&self) -> usize {
        self.diff.len() + self.creation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Dispose and forget every strategy; nothing is admitted afterwards
    pub fn dispose_all(&self) {
        self.disposed.store(true, Ordering::Release);
        let trackers = self.creation_trackers();
        self.creation.clear();
        self.diff.clear();
        for tracker in trackers {
            tracker.dispose();
        }
    }
}
