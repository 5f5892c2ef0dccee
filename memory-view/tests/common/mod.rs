// Shared harness for memory view integration tests
//
// Import from integration test files with `mod common;`

#![allow(dead_code)]

use memory_view::testing::MockDebuggee;
use memory_view::{
    CensusSnapshot, ClassIndex, ClassesView, DebugSession, InstancesTracker, MemoryViewConfig,
    TrackingType, ViewHandle, ViewOptions, ViewServices, ViewUpdate,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Harness {
    pub debuggee: Arc<MockDebuggee>,
    pub session: Arc<DebugSession>,
    pub tracker: Arc<InstancesTracker>,
    pub index: ClassIndex,
    pub view: ClassesView<MockDebuggee>,
    updates: UnboundedReceiver<ViewUpdate>,
}

impl Harness {
    pub fn new(debuggee: MockDebuggee) -> Self {
        Self::with(debuggee, InstancesTracker::new(), ViewOptions::default())
    }

    pub fn with_batch_size(debuggee: MockDebuggee, batch_size: usize) -> Self {
        Self::with(
            debuggee,
            InstancesTracker::new(),
            ViewOptions {
                batch_size: Some(batch_size),
                ..Default::default()
            },
        )
    }

    pub fn with_tracked(debuggee: MockDebuggee, tracked: &[(&str, TrackingType)]) -> Self {
        let mut config = MemoryViewConfig::default();
        for (name, tracking) in tracked {
            config.tracked_classes.insert(name.to_string(), *tracking);
        }
        Self::with(
            debuggee,
            InstancesTracker::from_config(&config),
            ViewOptions::default(),
        )
    }

    pub fn with(
        debuggee: MockDebuggee,
        tracker: Arc<InstancesTracker>,
        options: ViewOptions,
    ) -> Self {
        let debuggee = Arc::new(debuggee);
        let session = DebugSession::new();
        let index = ClassIndex::new();
        let (ui, updates) = ViewHandle::channel();

        let view = ClassesView::new(
            ViewServices {
                debuggee: Arc::clone(&debuggee),
                session: Arc::clone(&session),
                tracker: Arc::clone(&tracker),
                ui,
                lookup: Arc::new(index.clone()),
            },
            options,
        )
        .expect("view needs a runtime");

        Self {
            debuggee,
            session,
            tracker,
            index,
            view,
            updates,
        }
    }

    /// Make every loaded class resolvable by name
    pub fn index_loaded_classes(&self) {
        let classes = self.debuggee.classes();
        self.index.replace(&classes);
    }

    /// Let queued commands, alarms and simulated latency play out
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    /// Updates sent since the last call
    pub fn drain(&mut self) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }

    /// Pause with the reload flag raised and wait for the census
    pub async fn pause_and_count(&mut self) -> Vec<ViewUpdate> {
        self.view.set_need_reload(true);
        self.session.paused();
        self.settle().await;
        self.drain()
    }
}

pub fn snapshots(updates: &[ViewUpdate]) -> Vec<&CensusSnapshot> {
    updates
        .iter()
        .filter_map(|update| match update {
            ViewUpdate::Classes(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect()
}

pub fn busy_count(updates: &[ViewUpdate], busy: bool) -> usize {
    updates
        .iter()
        .filter(|update| **update == ViewUpdate::Busy(busy))
        .count()
}
