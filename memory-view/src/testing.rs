// In-memory debuggee for tests and demos

use crate::debuggee::{ClassPreparedSubscription, CreationFeed, Debuggee};
use crate::error::{MemoryViewError, Result};
use crate::model::{ClassDescriptor, InstanceHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

type CallHook = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct MockState {
    classes: Vec<ClassDescriptor>,
    instances: HashMap<ClassDescriptor, Vec<InstanceHandle>>,
    counts: HashMap<ClassDescriptor, u64>,
    count_latency: Duration,
    fail_counts_on_call: Option<usize>,
    fail_all_classes: bool,
    constrained: bool,
    detached: bool,
    counts_hook: Option<CallHook>,
    instances_hook: Option<CallHook>,
    fail_watch_creations: bool,
    creation_feeds: HashMap<ClassDescriptor, Vec<mpsc::UnboundedSender<InstanceHandle>>>,
    prepared: HashMap<String, Vec<oneshot::Sender<ClassDescriptor>>>,
    batch_sizes: Vec<usize>,
    all_classes_calls: usize,
    instances_calls: usize,
}

impl MockState {
    fn count_of(&self, class: &ClassDescriptor) -> u64 {
        self.counts.get(class).copied().unwrap_or_else(|| {
            self.instances
                .get(class)
                .map_or(0, |instances| instances.len() as u64)
        })
    }
}

/// Deterministic, in-memory `Debuggee` test double
#[derive(Default)]
pub struct MockDebuggee {
    state: Mutex<MockState>,
}

impl MockDebuggee {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` classes named `pkg.C0`, `pkg.C1`, ... with ids 1.. and
    /// `i + 1` live instances each
    pub fn with_classes(count: usize) -> Self {
        let mock = Self::new();
        for i in 0..count {
            let class = ClassDescriptor::new(format!("pkg.C{}", i), i as u64 + 1);
            let instances = (0..=i as u64).map(|n| InstanceHandle(((i as u64) << 32) | n)).collect();
            mock.add_class(class, instances);
        }
        mock
    }

    pub fn add_class(&self, class: ClassDescriptor, instances: Vec<InstanceHandle>) {
        let mut state = self.state.lock();
        if !state.classes.contains(&class) {
            state.classes.push(class.clone());
        }
        state.instances.insert(class, instances);
    }

    pub fn remove_class(&self, class: &ClassDescriptor) {
        let mut state = self.state.lock();
        state.classes.retain(|c| c != class);
        state.instances.remove(class);
        state.counts.remove(class);
    }

    pub fn classes(&self) -> Vec<ClassDescriptor> {
        self.state.lock().classes.clone()
    }

    pub fn set_instances(&self, class: &ClassDescriptor, instances: Vec<InstanceHandle>) {
        self.state.lock().instances.insert(class.clone(), instances);
    }

    /// Report `count` from bulk counts regardless of the instance list
    pub fn set_count(&self, class: &ClassDescriptor, count: u64) {
        self.state.lock().counts.insert(class.clone(), count);
    }

    /// Simulated round trip of every bulk-count call
    pub fn set_count_latency(&self, latency: Duration) {
        self.state.lock().count_latency = latency;
    }

    /// Make the `call`-th bulk-count call (1-based) fail
    pub fn fail_counts_on_call(&self, call: usize) {
        self.state.lock().fail_counts_on_call = Some(call);
    }

    pub fn set_fail_all_classes(&self, fail: bool) {
        self.state.lock().fail_all_classes = fail;
    }

    pub fn set_constrained(&self, constrained: bool) {
        self.state.lock().constrained = constrained;
    }

    pub fn set_attached(&self, attached: bool) {
        self.state.lock().detached = !attached;
    }

    /// Run `hook(call)` at the start of every bulk-count call
    pub fn on_instance_counts(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.state.lock().counts_hook = Some(Arc::new(hook));
    }

    /// Run `hook(call)` at the start of every instance listing
    pub fn on_instances(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.state.lock().instances_hook = Some(Arc::new(hook));
    }

    /// Refuse constructor watches, as a VM without MethodEntry support would
    pub fn set_fail_watch_creations(&self, fail: bool) {
        self.state.lock().fail_watch_creations = fail;
    }

    /// Size of every bulk-count request so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().batch_sizes.clone()
    }

    pub fn instance_count_calls(&self) -> usize {
        self.state.lock().batch_sizes.len()
    }

    pub fn all_classes_calls(&self) -> usize {
        self.state.lock().all_classes_calls
    }

    pub fn instances_calls(&self) -> usize {
        self.state.lock().instances_calls
    }

    /// Construct an object of `class`; returns how many watchers saw it
    pub fn create_instance(&self, class: &ClassDescriptor, handle: InstanceHandle) -> usize {
        let mut state = self.state.lock();
        state
            .instances
            .entry(class.clone())
            .or_default()
            .push(handle);

        let Some(feeds) = state.creation_feeds.get_mut(class) else {
            return 0;
        };
        feeds.retain(|feed| feed.send(handle).is_ok());
        feeds.len()
    }

    pub fn open_creation_feeds(&self, class: &ClassDescriptor) -> usize {
        self.state
            .lock()
            .creation_feeds
            .get(class)
            .map_or(0, |feeds| feeds.iter().filter(|feed| !feed.is_closed()).count())
    }

    /// Load a new class and notify everyone waiting for its name
    pub fn load_class(&self, class: ClassDescriptor, instances: Vec<InstanceHandle>) {
        self.add_class(class.clone(), instances);
        let waiters = self
            .state
            .lock()
            .prepared
            .remove(class.name())
            .unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(class.clone());
        }
    }

    pub fn pending_class_prepared(&self, name: &str) -> usize {
        self.state.lock().prepared.get(name).map_or(0, Vec::len)
    }
}

impl Debuggee for MockDebuggee {
    async fn all_classes(&self) -> Result<Vec<ClassDescriptor>> {
        let mut state = self.state.lock();
        state.all_classes_calls += 1;
        if state.fail_all_classes {
            return Err(MemoryViewError::Backend("injected class enumeration failure".into()));
        }
        Ok(state.classes.clone())
    }

    async fn classes_by_name(&self, name: &str) -> Result<Vec<ClassDescriptor>> {
        let state = self.state.lock();
        Ok(state
            .classes
            .iter()
            .filter(|class| class.name() == name)
            .cloned()
            .collect())
    }

    async fn instances(
        &self,
        class: &ClassDescriptor,
        limit: Option<u32>,
    ) -> Result<Vec<InstanceHandle>> {
        let (call, hook) = {
            let mut state = self.state.lock();
            state.instances_calls += 1;
            (state.instances_calls, state.instances_hook.clone())
        };
        if let Some(hook) = hook {
            hook(call);
        }

        let state = self.state.lock();
        let mut instances = state.instances.get(class).cloned().unwrap_or_default();
        if let Some(limit) = limit {
            instances.truncate(limit as usize);
        }
        Ok(instances)
    }

    async fn instance_counts(&self, classes: &[ClassDescriptor]) -> Result<Vec<u64>> {
        let (call, latency, hook, fail) = {
            let mut state = self.state.lock();
            state.batch_sizes.push(classes.len());
            let call = state.batch_sizes.len();
            (
                call,
                state.count_latency,
                state.counts_hook.clone(),
                state.fail_counts_on_call == Some(call),
            )
        };

        if let Some(hook) = hook {
            hook(call);
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(MemoryViewError::Backend(format!(
                "injected failure on count call {}",
                call
            )));
        }

        let state = self.state.lock();
        Ok(classes.iter().map(|class| state.count_of(class)).collect())
    }

    async fn watch_creations(&self, class: &ClassDescriptor) -> Result<CreationFeed> {
        let mut state = self.state.lock();
        if state.fail_watch_creations {
            return Err(MemoryViewError::Backend(format!(
                "injected failure watching {}",
                class
            )));
        }
        let (tx, feed) = CreationFeed::channel();
        state
            .creation_feeds
            .entry(class.clone())
            .or_default()
            .push(tx);
        Ok(feed)
    }

    async fn subscribe_class_prepared(&self, name: &str) -> Result<ClassPreparedSubscription> {
        let (tx, subscription) = ClassPreparedSubscription::channel(name);
        self.state
            .lock()
            .prepared
            .entry(name.to_string())
            .or_default()
            .push(tx);
        Ok(subscription)
    }

    fn is_attached(&self) -> bool {
        !self.state.lock().detached
    }

    fn is_resource_constrained(&self) -> bool {
        self.state.lock().constrained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_follow_instances_unless_overridden() {
        let mock = MockDebuggee::with_classes(3);
        let classes = mock.all_classes().await.unwrap();
        assert_eq!(mock.instance_counts(&classes).await.unwrap(), vec![1, 2, 3]);

        mock.set_count(&classes[0], 40);
        assert_eq!(mock.instance_counts(&classes[..1]).await.unwrap(), vec![40]);
        assert_eq!(mock.batch_sizes(), vec![3, 1]);
    }

    #[tokio::test]
    async fn test_injected_failure_hits_one_call() {
        let mock = MockDebuggee::with_classes(2);
        mock.fail_counts_on_call(2);
        let classes = mock.classes();

        assert!(mock.instance_counts(&classes).await.is_ok());
        assert!(mock.instance_counts(&classes).await.is_err());
        assert!(mock.instance_counts(&classes).await.is_ok());
    }

    #[tokio::test]
    async fn test_creation_feed_sees_new_objects() {
        let mock = MockDebuggee::new();
        let foo = ClassDescriptor::new("a.Foo", 1);
        mock.add_class(foo.clone(), vec![]);

        let mut feed = mock.watch_creations(&foo).await.unwrap();
        assert_eq!(mock.create_instance(&foo, InstanceHandle(7)), 1);
        assert_eq!(feed.drain(), vec![InstanceHandle(7)]);

        drop(feed);
        assert_eq!(mock.open_creation_feeds(&foo), 0);
        assert_eq!(mock.create_instance(&foo, InstanceHandle(8)), 0);
    }

    #[tokio::test]
    async fn test_load_class_resolves_subscription() {
        let mock = MockDebuggee::new();
        let subscription = mock.subscribe_class_prepared("a.Late").await.unwrap();
        assert_eq!(mock.pending_class_prepared("a.Late"), 1);

        mock.load_class(ClassDescriptor::new("a.Late", 5), vec![]);
        assert_eq!(subscription.prepared().await.map(|c| c.id()), Some(5));
        assert_eq!(mock.pending_class_prepared("a.Late"), 0);
    }
}
