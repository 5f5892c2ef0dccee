// Creation tracking: objects constructed while the debuggee ran

use super::TrackerForNewInstances;
use crate::debuggee::CreationFeed;
use crate::model::{ClassDescriptor, InstanceHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Default)]
struct CreationState {
    committed: Vec<InstanceHandle>,
    ready: bool,
    obsolete: bool,
}

/// Collects constructor hits reported by the debuggee
///
/// Objects reported while running stay pending until `commit_tracked`
/// (on pause) turns them into the visible set. Resuming marks the visible
/// set obsolete.
pub struct ConstructorInstanceTracker {
    class: ClassDescriptor,
    feed: Mutex<Option<CreationFeed>>,
    state: Mutex<CreationState>,
    disposed: AtomicBool,
}

impl ConstructorInstanceTracker {
    pub fn new(class: ClassDescriptor, feed: CreationFeed) -> Self {
        Self {
            class,
            feed: Mutex::new(Some(feed)),
            state: Mutex::new(CreationState::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    /// Make everything created since the last commit the visible set
    pub fn commit_tracked(&self) {
        let created = match self.feed.lock().as_mut() {
            Some(feed) => feed.drain(),
            None => return,
        };

        let mut state = self.state.lock();
        debug!("Committed {} new {} instances", created.len(), self.class.name());
        state.committed = created;
        state.ready = true;
        state.obsolete = false;
    }

    /// The visible set belongs to a pause that has ended
    pub fn obsolete(&self) {
        self.state.lock().obsolete = true;
    }

    pub fn is_obsolete(&self) -> bool {
        self.state.lock().obsolete
    }

    /// Stop watching constructors; safe to call any number of times
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Disposing creation tracker for {}", self.class);
        self.feed.lock().take();
        let mut state = self.state.lock();
        state.committed.clear();
        state.ready = false;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl TrackerForNewInstances for ConstructorInstanceTracker {
    fn new_instances(&self) -> Vec<InstanceHandle> {
        let state = self.state.lock();
        if state.obsolete {
            Vec::new()
        } else {
            state.committed.clone()
        }
    }

    fn count(&self) -> usize {
        let state = self.state.lock();
        if state.obsolete {
            0
        } else {
            state.committed.len()
        }
    }

    fn is_ready(&self) -> bool {
        let state = self.state.lock();
        state.ready && !state.obsolete
    }
}

impl Drop for ConstructorInstanceTracker {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_obsolete_cycle() {
        let (tx, feed) = CreationFeed::channel();
        let tracker = ConstructorInstanceTracker::new(ClassDescriptor::new("a.Foo", 1), feed);
        assert!(!tracker.is_ready());

        tx.send(InstanceHandle(10)).unwrap();
        tx.send(InstanceHandle(11)).unwrap();
        tracker.commit_tracked();
        assert!(tracker.is_ready());
        assert_eq!(tracker.new_instances(), vec![InstanceHandle(10), InstanceHandle(11)]);

        tracker.obsolete();
        assert!(!tracker.is_ready());
        assert_eq!(tracker.count(), 0);

        tx.send(InstanceHandle(12)).unwrap();
        tracker.commit_tracked();
        assert_eq!(tracker.new_instances(), vec![InstanceHandle(12)]);
    }

    #[test]
    fn test_dispose_is_idempotent_and_closes_feed() {
        let (tx, feed) = CreationFeed::channel();
        let tracker = ConstructorInstanceTracker::new(ClassDescriptor::new("a.Foo", 1), feed);

        tracker.dispose();
        tracker.dispose();
        assert!(tracker.is_disposed());
        assert!(tx.is_closed());

        tracker.commit_tracked();
        assert!(!tracker.is_ready());
    }
}
