// The debuggee-process collaborator
//
// Everything the engine asks of the inspected process goes through this
// trait. Calls are only ever made from the command worker, one at a time.

use crate::error::Result;
use crate::model::{ClassDescriptor, InstanceHandle};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

pub trait Debuggee: Send + Sync + 'static {
    /// All loaded classes, in backend order
    fn all_classes(&self) -> impl Future<Output = Result<Vec<ClassDescriptor>>> + Send;

    /// Loaded classes with the given qualified name (one per defining loader)
    fn classes_by_name(&self, name: &str) -> impl Future<Output = Result<Vec<ClassDescriptor>>> + Send;

    /// Live instances of `class`; `None` means unbounded
    fn instances(
        &self,
        class: &ClassDescriptor,
        limit: Option<u32>,
    ) -> impl Future<Output = Result<Vec<InstanceHandle>>> + Send;

    /// Bulk instance counts, one per class, in request order
    fn instance_counts(&self, classes: &[ClassDescriptor]) -> impl Future<Output = Result<Vec<u64>>> + Send;

    /// Start reporting objects constructed from now on
    fn watch_creations(&self, class: &ClassDescriptor) -> impl Future<Output = Result<CreationFeed>> + Send;

    /// Resolve once a class with this name gets loaded
    fn subscribe_class_prepared(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ClassPreparedSubscription>> + Send;

    fn is_attached(&self) -> bool;

    /// Lightweight targets (Android) get smaller bulk-count batches
    fn is_resource_constrained(&self) -> bool;
}

/// Stream of newly constructed objects for one class
///
/// Dropping the feed tells the backend to stop watching.
#[derive(Debug)]
pub struct CreationFeed {
    receiver: mpsc::UnboundedReceiver<InstanceHandle>,
}

impl CreationFeed {
    pub fn channel() -> (mpsc::UnboundedSender<InstanceHandle>, Self) {
        let (tx, receiver) = mpsc::unbounded_channel();
        (tx, Self { receiver })
    }

    /// Everything reported since the last drain
    pub fn drain(&mut self) -> Vec<InstanceHandle> {
        let mut created = Vec::new();
        while let Ok(handle) = self.receiver.try_recv() {
            created.push(handle);
        }
        created
    }
}

/// One-shot notification for a class that is not loaded yet
#[derive(Debug)]
pub struct ClassPreparedSubscription {
    name: String,
    receiver: oneshot::Receiver<ClassDescriptor>,
}

impl ClassPreparedSubscription {
    pub fn channel(name: impl Into<String>) -> (oneshot::Sender<ClassDescriptor>, Self) {
        let (tx, receiver) = oneshot::channel();
        (
            tx,
            Self {
                name: name.into(),
                receiver,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the class; `None` if the backend went away first
    pub async fn prepared(self) -> Option<ClassDescriptor> {
        self.receiver.await.ok()
    }
}
