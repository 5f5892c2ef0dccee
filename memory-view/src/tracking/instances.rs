// Diff-based tracking: which live instances were not there last time

use super::TrackerForNewInstances;
use crate::model::{ClassDescriptor, InstanceHandle};
use crate::suspend::SuspendContextRef;
use parking_lot::Mutex;
use std::collections::HashSet;

struct DiffState {
    baseline: HashSet<InstanceHandle>,
    new_instances: Vec<InstanceHandle>,
    last_context: Option<SuspendContextRef>,
    ready: bool,
}

pub struct InstanceTrackingStrategy {
    class: ClassDescriptor,
    state: Mutex<DiffState>,
}

impl InstanceTrackingStrategy {
    /// Seed with the instances alive when tracking was requested
    pub fn new(
        class: ClassDescriptor,
        context: Option<SuspendContextRef>,
        baseline: Vec<InstanceHandle>,
    ) -> Self {
        Self {
            class,
            state: Mutex::new(DiffState {
                baseline: baseline.into_iter().collect(),
                new_instances: Vec::new(),
                last_context: context,
                ready: false,
            }),
        }
    }

    pub fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    /// Compare `current` with the previous snapshot and make it the new baseline
    ///
    /// Repeated updates within the same pause keep the first result.
    pub fn update(&self, context: &SuspendContextRef, current: Vec<InstanceHandle>) {
        let mut state = self.state.lock();
        if state.ready && state.last_context.as_ref() == Some(context) {
            return;
        }

        let new_instances: Vec<InstanceHandle> = current
            .iter()
            .filter(|handle| !state.baseline.contains(*handle))
            .copied()
            .collect();

        state.baseline = current.into_iter().collect();
        state.new_instances = new_instances;
        state.last_context = Some(context.clone());
        state.ready = true;
    }
}

impl TrackerForNewInstances for InstanceTrackingStrategy {
    fn new_instances(&self) -> Vec<InstanceHandle> {
        self.state.lock().new_instances.clone()
    }

    fn count(&self) -> usize {
        self.state.lock().new_instances.len()
    }

    fn is_ready(&self) -> bool {
        self.state.lock().ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles(ids: &[u64]) -> Vec<InstanceHandle> {
        ids.iter().copied().map(InstanceHandle).collect()
    }

    #[test]
    fn test_reports_instances_missing_from_previous_snapshot() {
        let strategy = InstanceTrackingStrategy::new(
            ClassDescriptor::new("a.Foo", 1),
            None,
            handles(&[1, 2, 3]),
        );
        assert!(!strategy.is_ready());

        let pause = SuspendContextRef::new();
        strategy.update(&pause, handles(&[2, 3, 4, 5]));
        assert!(strategy.is_ready());
        assert_eq!(strategy.new_instances(), handles(&[4, 5]));

        let next = SuspendContextRef::new();
        strategy.update(&next, handles(&[4, 6]));
        assert_eq!(strategy.new_instances(), handles(&[6]));
        assert_eq!(strategy.count(), 1);
    }

    #[test]
    fn test_same_pause_update_is_ignored() {
        let strategy =
            InstanceTrackingStrategy::new(ClassDescriptor::new("a.Foo", 1), None, handles(&[1]));
        let pause = SuspendContextRef::new();

        strategy.update(&pause, handles(&[1, 2]));
        strategy.update(&pause, handles(&[1, 2, 3]));
        assert_eq!(strategy.new_instances(), handles(&[2]));
    }
}
