// Debug session state and lifecycle notifications
//
// The session is the single owner of "is the debuggee paused, and under
// which suspend episode". Whoever observes the VM (the JDWP event pump, the
// CLI) drives it through `paused` / `resumed` / `stopped`.

use crate::listeners::{ListenerId, ListenerList};
use crate::suspend::SuspendContextRef;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives session lifecycle notifications, possibly on a foreign thread
pub trait SessionListener: Send + Sync {
    fn session_paused(&self) {}
    fn session_resumed(&self) {}
    fn session_stopped(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Suspended,
    Stopped,
}

struct State {
    context: Option<SuspendContextRef>,
    stopped: bool,
}

pub struct DebugSession {
    state: RwLock<State>,
    listeners: ListenerList<dyn SessionListener>,
}

impl DebugSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(State {
                context: None,
                stopped: false,
            }),
            listeners: ListenerList::new(),
        })
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn state(&self) -> SessionState {
        let state = self.state.read();
        if state.stopped {
            SessionState::Stopped
        } else if state.context.is_some() {
            SessionState::Suspended
        } else {
            SessionState::Running
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.state.read().context.is_some()
    }

    /// Context of the current pause, `None` while running or after stop
    pub fn suspend_context(&self) -> Option<SuspendContextRef> {
        self.state.read().context.clone()
    }

    /// Start a new suspend episode and notify listeners
    ///
    /// A pause while already paused (e.g. a step finishing) still opens a
    /// new episode; results computed under the old one become stale.
    pub fn paused(&self) -> Option<SuspendContextRef> {
        let context = {
            let mut state = self.state.write();
            if state.stopped {
                return None;
            }
            let context = SuspendContextRef::new();
            state.context = Some(context.clone());
            context
        };

        debug!("Session paused ({:?})", context);
        self.listeners.dispatch(|l| l.session_paused());
        Some(context)
    }

    pub fn resumed(&self) {
        {
            let mut state = self.state.write();
            if state.stopped {
                return;
            }
            state.context = None;
        }

        debug!("Session resumed");
        self.listeners.dispatch(|l| l.session_resumed());
    }

    pub fn stopped(&self) {
        {
            let mut state = self.state.write();
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.context = None;
        }

        info!("Session stopped");
        self.listeners.dispatch(|l| l.session_stopped());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<&'static str>>,
    }

    impl SessionListener for Recorder {
        fn session_paused(&self) {
            self.events.lock().push("paused");
        }
        fn session_resumed(&self) {
            self.events.lock().push("resumed");
        }
        fn session_stopped(&self) {
            self.events.lock().push("stopped");
        }
    }

    #[test]
    fn test_each_pause_opens_a_new_episode() {
        let session = DebugSession::new();
        assert_eq!(session.state(), SessionState::Running);

        let first = session.paused().unwrap();
        assert_eq!(session.suspend_context(), Some(first.clone()));

        let second = session.paused().unwrap();
        assert_ne!(first, second);

        session.resumed();
        assert!(session.suspend_context().is_none());
        assert_eq!(session.state(), SessionState::Running);
    }

    #[test]
    fn test_listeners_see_transitions_until_stop() {
        let session = DebugSession::new();
        let recorder = Arc::new(Recorder::default());
        session.add_listener(recorder.clone());

        session.paused();
        session.resumed();
        session.stopped();
        session.paused();
        session.stopped();

        assert_eq!(*recorder.events.lock(), vec!["paused", "resumed", "stopped"]);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.suspend_context().is_none());
    }
}
