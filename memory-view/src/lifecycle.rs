// Session lifecycle observer for the classes view
//
// Notifications may come from any thread (the JDWP event pump, the CLI).
// They only touch the alarm, strategy flags and the UI channel; debuggee
// work is always left to the scheduler.

use crate::debuggee::Debuggee;
use crate::listeners::ListenerId;
use crate::presentation::{StatusText, ViewUpdate};
use crate::session::{DebugSession, SessionListener};
use crate::view::ViewCore;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

pub struct SessionLifecycleObserver<D: Debuggee> {
    core: Weak<ViewCore<D>>,
    session: Weak<DebugSession>,
    id: OnceLock<ListenerId>,
}

impl<D: Debuggee> SessionLifecycleObserver<D> {
    pub(crate) fn attach(core: Weak<ViewCore<D>>, session: &Arc<DebugSession>) -> Arc<Self> {
        let observer = Arc::new(Self {
            core,
            session: Arc::downgrade(session),
            id: OnceLock::new(),
        });
        let id = session.add_listener(observer.clone());
        let _ = observer.id.set(id);
        observer
    }

    /// Stop receiving session notifications
    pub fn detach(&self) {
        let (Some(session), Some(id)) = (self.session.upgrade(), self.id.get()) else {
            return;
        };
        if session.remove_listener(*id) {
            debug!("Lifecycle observer detached");
        }
    }
}

impl<D: Debuggee> SessionListener for SessionLifecycleObserver<D> {
    fn session_resumed(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        core.registry().mark_creation_obsolete();
        core.ui().send(ViewUpdate::Status(StatusText::Running));
        // Hiding the content also drops the busy indicator
        core.ui().send(ViewUpdate::HideContent);
        core.alarm().cancel_all();
    }

    fn session_paused(&self) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        core.ui().send(ViewUpdate::Status(StatusText::NothingToShow));
        if core.need_reload() {
            core.registry().commit_creation();
            core.request_census_now();
        }
    }

    fn session_stopped(&self) {
        self.detach();
    }
}
