// Tracked-class service
//
// Owns the user's "class name -> tracking type" choices for a session and
// tells subscribers when one is added, changed or removed.

use crate::config::MemoryViewConfig;
use crate::listeners::{ListenerId, ListenerList};
use crate::model::TrackingType;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub trait TrackerListener: Send + Sync {
    fn class_changed(&self, name: &str, tracking: TrackingType);
    fn class_removed(&self, name: &str);
}

#[derive(Default)]
pub struct InstancesTracker {
    classes: RwLock<BTreeMap<String, TrackingType>>,
    listeners: ListenerList<dyn TrackerListener>,
}

impl InstancesTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn from_config(config: &MemoryViewConfig) -> Arc<Self> {
        Arc::new(Self {
            classes: RwLock::new(config.tracked_classes.clone()),
            listeners: ListenerList::new(),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn TrackerListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Track `name`; re-adding notifies again even with the same type
    pub fn add(&self, name: &str, tracking: TrackingType) {
        self.classes.write().insert(name.to_string(), tracking);
        debug!("Tracking {} as {}", name, tracking);
        self.listeners.dispatch(|l| l.class_changed(name, tracking));
    }

    pub fn remove(&self, name: &str) -> bool {
        if self.classes.write().remove(name).is_none() {
            return false;
        }
        debug!("No longer tracking {}", name);
        self.listeners.dispatch(|l| l.class_removed(name));
        true
    }

    pub fn tracking_type(&self, name: &str) -> Option<TrackingType> {
        self.classes.read().get(name).copied()
    }

    pub fn tracked_classes(&self) -> BTreeMap<String, TrackingType> {
        self.classes.read().clone()
    }

    /// Write the tracked classes back into `config`
    pub fn store_into(&self, config: &mut MemoryViewConfig) {
        config.tracked_classes = self.tracked_classes();
    }
}
