// Debuggee backed by a live JVM over JDWP
//
// Command replies go through `JdwpConnection`; the event pump turns VM
// events into session transitions, class-prepared notifications and
// constructor hits for creation tracking.

use crate::debuggee::{ClassPreparedSubscription, CreationFeed, Debuggee};
use crate::error::Result;
use crate::model::{ClassDescriptor, InstanceHandle};
use crate::session::DebugSession;
use dashmap::DashMap;
use jdwp_client::commands::event_kinds;
use jdwp_client::types::{name_to_signature, signature_to_name, MethodId};
use jdwp_client::{
    ClassInfo, Event, EventKind, EventSet, JdwpConnection, Location, SuspendPolicy, ThreadId,
};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// ClassStatus.PREPARED
const CLASS_STATUS_PREPARED: i32 = 2;

struct CreationWatch {
    class: ClassDescriptor,
    constructors: HashSet<MethodId>,
    tx: mpsc::UnboundedSender<InstanceHandle>,
}

pub struct JdwpDebuggee {
    connection: JdwpConnection,
    constrained: bool,
    /// MethodEntry request id -> watch
    creations: DashMap<i32, CreationWatch>,
    /// ClassPrepare request id -> waiter
    prepared: DashMap<i32, oneshot::Sender<ClassDescriptor>>,
}

impl JdwpDebuggee {
    /// Connect to a JVM and identify it
    pub async fn attach(host: &str, port: u16) -> Result<Arc<Self>> {
        let connection = JdwpConnection::connect(host, port).await?;
        Self::from_connection(connection).await
    }

    pub async fn from_connection(connection: JdwpConnection) -> Result<Arc<Self>> {
        let version = connection.get_version().await?;
        info!(
            "Attached to {} {} (JDWP {}.{})",
            version.vm_name, version.vm_version, version.jdwp_major, version.jdwp_minor
        );

        Ok(Arc::new(Self {
            connection,
            constrained: version.is_android(),
            creations: DashMap::new(),
            prepared: DashMap::new(),
        }))
    }

    pub fn connection(&self) -> &JdwpConnection {
        &self.connection
    }

    /// Suspend the whole VM and open a new pause episode
    pub async fn suspend(&self, session: &DebugSession) -> Result<()> {
        self.connection.suspend_all().await?;
        session.paused();
        Ok(())
    }

    /// Close the pause episode and let the VM run
    pub async fn resume(&self, session: &DebugSession) -> Result<()> {
        session.resumed();
        self.connection.resume_all().await?;
        Ok(())
    }

    /// Drive `session` from VM events until the connection closes
    pub fn spawn_event_pump(self: &Arc<Self>, session: Arc<DebugSession>) -> JoinHandle<()> {
        let connection = self.connection.clone();
        let debuggee: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(events) = connection.recv_event().await {
                let Some(debuggee) = debuggee.upgrade() else {
                    break;
                };
                debuggee.handle_event_set(events, &session).await;
            }
            info!("JDWP event stream ended");
            session.stopped();
        })
    }

    async fn handle_event_set(&self, events: EventSet, session: &DebugSession) {
        let mut event_thread = None;
        for event in &events.events {
            if event_thread.is_none() {
                event_thread = thread_of(&event.details);
            }
            self.handle_event(event, session).await;
        }

        if events.suspends_all() {
            session.paused();
        } else if events.suspend_policy == SuspendPolicy::EventThread as u8 {
            if let Some(thread) = event_thread {
                if let Err(e) = self.connection.resume_thread(thread).await {
                    warn!("Failed to resume thread {:x}: {}", thread, e);
                }
            }
        }
    }

    async fn handle_event(&self, event: &Event, session: &DebugSession) {
        match &event.details {
            EventKind::VMDeath => session.stopped(),
            EventKind::ClassPrepare {
                ref_type,
                signature,
                ..
            } => {
                if let Some((_, waiter)) = self.prepared.remove(&event.request_id) {
                    let class = ClassDescriptor::new(signature_to_name(signature), *ref_type);
                    debug!("Class prepared: {}", class);
                    let _ = waiter.send(class);
                }
            }
            EventKind::MethodEntry { thread, location } => {
                self.record_creation(event.request_id, *thread, location).await;
            }
            _ => {}
        }
    }

    async fn record_creation(&self, request_id: i32, thread: ThreadId, location: &Location) {
        let tx = match self.creations.get(&request_id) {
            Some(watch) if watch.constructors.contains(&location.method_id) => watch.tx.clone(),
            _ => return,
        };

        if tx.is_closed() {
            self.stop_watching(request_id).await;
            return;
        }

        match self.connection.top_frame_this(thread).await {
            Ok(Some(object)) => {
                let _ = tx.send(InstanceHandle(object));
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read constructed object: {}", e),
        }
    }

    async fn stop_watching(&self, request_id: i32) {
        if let Some((_, watch)) = self.creations.remove(&request_id) {
            debug!("Stopped watching creations of {}", watch.class);
            if let Err(e) = self
                .connection
                .clear_event_request(event_kinds::METHOD_ENTRY, request_id)
                .await
            {
                warn!("Failed to clear MethodEntry request {}: {}", request_id, e);
            }
        }
    }

    /// Clear MethodEntry requests whose feed has been dropped
    async fn prune_watches(&self) {
        let closed: Vec<i32> = self
            .creations
            .iter()
            .filter(|watch| watch.tx.is_closed())
            .map(|watch| *watch.key())
            .collect();
        for request_id in closed {
            self.stop_watching(request_id).await;
        }
    }
}

fn thread_of(kind: &EventKind) -> Option<ThreadId> {
    match kind {
        EventKind::VMStart { thread }
        | EventKind::ThreadStart { thread }
        | EventKind::ThreadDeath { thread }
        | EventKind::ClassPrepare { thread, .. }
        | EventKind::Breakpoint { thread, .. }
        | EventKind::Step { thread, .. }
        | EventKind::Exception { thread, .. }
        | EventKind::MethodEntry { thread, .. } => Some(*thread),
        EventKind::VMDeath | EventKind::Unknown { .. } => None,
    }
}

fn descriptor(info: &ClassInfo) -> ClassDescriptor {
    ClassDescriptor::new(info.name(), info.type_id)
}

impl Debuggee for JdwpDebuggee {
    async fn all_classes(&self) -> Result<Vec<ClassDescriptor>> {
        let classes = self.connection.all_classes().await?;
        Ok(classes
            .iter()
            .filter(|info| info.status & CLASS_STATUS_PREPARED != 0)
            .map(descriptor)
            .collect())
    }

    async fn classes_by_name(&self, name: &str) -> Result<Vec<ClassDescriptor>> {
        let classes = self
            .connection
            .classes_by_signature(&name_to_signature(name))
            .await?;
        Ok(classes.iter().map(descriptor).collect())
    }

    async fn instances(
        &self,
        class: &ClassDescriptor,
        limit: Option<u32>,
    ) -> Result<Vec<InstanceHandle>> {
        let max = limit.map_or(0, |limit| i32::try_from(limit).unwrap_or(i32::MAX));
        let objects = self.connection.get_instances(class.id(), max).await?;
        Ok(objects.into_iter().map(InstanceHandle).collect())
    }

    async fn instance_counts(&self, classes: &[ClassDescriptor]) -> Result<Vec<u64>> {
        let ids: Vec<u64> = classes.iter().map(|class| class.id()).collect();
        Ok(self.connection.instance_counts(&ids).await?)
    }

    async fn watch_creations(&self, class: &ClassDescriptor) -> Result<CreationFeed> {
        self.prune_watches().await;

        let constructors: HashSet<MethodId> = self
            .connection
            .get_methods(class.id())
            .await?
            .into_iter()
            .filter(|method| method.is_constructor())
            .map(|method| method.method_id)
            .collect();
        let request_id = self.connection.request_method_entry(class.id()).await?;
        debug!(
            "Watching {} constructors of {} (request {})",
            constructors.len(),
            class,
            request_id
        );

        let (tx, feed) = CreationFeed::channel();
        self.creations.insert(
            request_id,
            CreationWatch {
                class: class.clone(),
                constructors,
                tx,
            },
        );
        Ok(feed)
    }

    async fn subscribe_class_prepared(&self, name: &str) -> Result<ClassPreparedSubscription> {
        let request_id = self.connection.request_class_prepare(name).await?;
        let (tx, subscription) = ClassPreparedSubscription::channel(name);
        self.prepared.insert(request_id, tx);
        debug!("Waiting for class {} (request {})", name, request_id);
        Ok(subscription)
    }

    fn is_attached(&self) -> bool {
        !self.connection.is_closed()
    }

    fn is_resource_constrained(&self) -> bool {
        self.constrained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location {
            type_tag: 1,
            class_id: 1,
            method_id: 2,
            index: 0,
        }
    }

    #[test]
    fn test_event_thread_extraction() {
        assert_eq!(thread_of(&EventKind::VMDeath), None);
        assert_eq!(
            thread_of(&EventKind::MethodEntry {
                thread: 0x42,
                location: location(),
            }),
            Some(0x42)
        );
        assert_eq!(
            thread_of(&EventKind::ClassPrepare {
                thread: 7,
                ref_type_tag: 1,
                ref_type: 9,
                signature: "La/B;".to_string(),
                status: 7,
            }),
            Some(7)
        );
    }

    #[test]
    fn test_descriptor_uses_java_name() {
        let info = ClassInfo {
            ref_type_tag: 1,
            type_id: 0x10,
            signature: "Lcom/example/Foo;".to_string(),
            status: 7,
        };
        let class = descriptor(&info);
        assert_eq!(class.name(), "com.example.Foo");
        assert_eq!(class.id(), 0x10);
    }
}
