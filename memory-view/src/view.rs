// Classes view: the census-and-tracking engine bound to one debug session
//
// Everything that talks to the debuggee runs as a command on the view's
// scheduler. Session and tracker notifications only enqueue work; results
// reach the table through the `ViewHandle` channel.

use crate::alarm::AdaptiveAlarm;
use crate::census::{CensusOutcome, ClassCensusEngine};
use crate::command::{CommandAction, DebuggerCommand};
use crate::debuggee::Debuggee;
use crate::error::{MemoryViewError, Result};
use crate::lifecycle::SessionLifecycleObserver;
use crate::listeners::ListenerId;
use crate::model::{ClassDescriptor, TrackingType};
use crate::presentation::{ClassLookup, StatusText, ViewHandle, ViewUpdate};
use crate::scheduler::{CommandHandler, CommandScheduler};
use crate::session::DebugSession;
use crate::suspend::SuspendContextRef;
use crate::tracker::{InstancesTracker, TrackerListener};
use crate::tracking::{TrackedStrategy, TrackingRegistry};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Collaborators a view is wired to
pub struct ViewServices<D> {
    pub debuggee: Arc<D>,
    pub session: Arc<DebugSession>,
    pub tracker: Arc<InstancesTracker>,
    pub ui: ViewHandle,
    pub lookup: Arc<dyn ClassLookup>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Overrides the backend-dependent bulk-count batch size
    pub batch_size: Option<usize>,
    pub show_with_diff_only: bool,
    pub show_with_instances_only: bool,
}

pub(crate) struct ViewCore<D: Debuggee> {
    debuggee: Arc<D>,
    session: Arc<DebugSession>,
    tracker: Arc<InstancesTracker>,
    ui: ViewHandle,
    lookup: Arc<dyn ClassLookup>,
    scheduler: CommandScheduler<DebuggerCommand>,
    alarm: AdaptiveAlarm,
    registry: TrackingRegistry,
    census: ClassCensusEngine,
    need_reload: AtomicBool,
    last_census_context: Mutex<Option<SuspendContextRef>>,
    tracker_listener: Mutex<Option<ListenerId>>,
    prepared_waiters: Mutex<Vec<JoinHandle<()>>>,
    weak_self: Weak<ViewCore<D>>,
}

impl<D: Debuggee> ViewCore<D> {
    pub(crate) fn registry(&self) -> &TrackingRegistry {
        &self.registry
    }

    pub(crate) fn alarm(&self) -> &AdaptiveAlarm {
        &self.alarm
    }

    pub(crate) fn ui(&self) -> &ViewHandle {
        &self.ui
    }

    pub(crate) fn need_reload(&self) -> bool {
        self.need_reload.load(Ordering::Acquire)
    }

    fn is_current(&self, context: &SuspendContextRef) -> bool {
        self.session.suspend_context().as_ref() == Some(context)
    }

    fn schedule(&self, command: DebuggerCommand) {
        let name = command.name();
        if let Err(e) = self.scheduler.schedule(command) {
            debug!("Dropping {} command: {}", name, e);
        }
    }

    /// Alarm callback: bind a census to the current pause, if any
    fn on_alarm(&self) {
        let Some(context) = self.session.suspend_context() else {
            debug!("Alarm fired while running, skipping census");
            return;
        };

        *self.last_census_context.lock() = Some(context.clone());
        self.ui.send(ViewUpdate::Busy(true));
        if let Err(e) = self.scheduler.schedule(DebuggerCommand::census(context)) {
            debug!("Census not scheduled: {}", e);
            self.ui.send(ViewUpdate::Busy(false));
        }
    }

    pub(crate) fn update_classes_and_counts(&self) {
        if self.debuggee.is_attached() {
            self.alarm.request_fire();
        }
    }

    /// Fresh pause: recount without waiting for the adaptive delay
    pub(crate) fn request_census_now(&self) {
        if self.debuggee.is_attached() {
            self.alarm.request_fire_now();
        }
    }

    async fn run_census(&self, context: &SuspendContextRef) {
        let outcome = self
            .census
            .run(
                self.debuggee.as_ref(),
                &self.registry,
                &self.alarm,
                context,
                || self.is_current(context),
            )
            .await;

        match outcome {
            Ok(CensusOutcome::Published(snapshot)) => {
                debug!("Publishing census of {} classes", snapshot.len());
                self.ui.send(ViewUpdate::Classes(snapshot));
            }
            Ok(CensusOutcome::Empty) | Ok(CensusOutcome::Stale) => {}
            Err(e) => error!("Census failed: {}", e),
        }
        self.ui.send(ViewUpdate::Busy(false));
    }

    async fn track_class(
        &self,
        class: ClassDescriptor,
        tracking: TrackingType,
        context: Option<SuspendContextRef>,
    ) {
        let is_current = || context.as_ref().map_or(true, |ctx| self.is_current(ctx));
        match self
            .registry
            .track_class(
                self.debuggee.as_ref(),
                class.clone(),
                tracking,
                context.clone(),
                is_current,
            )
            .await
        {
            Ok(true) => {
                self.ui.send(ViewUpdate::Refresh);
            }
            Ok(false) => debug!("Tracking request for {} discarded", class),
            Err(e) => warn!("Failed to track {}: {}", class, e),
        }
    }

    fn untrack_class(&self, name: &str) {
        match self.registry.remove_diff_tracked_by_name(name) {
            Ok(_) => {
                self.ui.send(ViewUpdate::Refresh);
            }
            Err(e) => error!("Failed to untrack {}: {}", name, e),
        }
    }

    async fn restore_tracked(&self) {
        for (name, tracking) in self.tracker.tracked_classes() {
            match self.debuggee.classes_by_name(&name).await {
                Ok(classes) if classes.is_empty() => self.wait_for_class(name, tracking).await,
                Ok(classes) => {
                    for class in classes {
                        let context = self.session.suspend_context();
                        self.track_class(class, tracking, context).await;
                    }
                }
                Err(e) => warn!("Failed to look up tracked class {}: {}", name, e),
            }
        }

        let bridge: Arc<dyn TrackerListener> = Arc::new(TrackerBridge {
            core: self.weak_self.clone(),
        });
        *self.tracker_listener.lock() = Some(self.tracker.add_listener(bridge));
        debug!("Subscribed to tracked class changes");
    }

    async fn wait_for_class(&self, name: String, tracking: TrackingType) {
        let subscription = match self.debuggee.subscribe_class_prepared(&name).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Cannot watch for {} to load: {}", name, e);
                return;
            }
        };

        debug!("Waiting for {} to load", name);
        let core = self.weak_self.clone();
        let waiter = tokio::spawn(async move {
            let Some(class) = subscription.prepared().await else {
                return;
            };
            if let Some(core) = core.upgrade() {
                info!("Tracked class {} loaded", class);
                let context = core.session.suspend_context();
                core.schedule(DebuggerCommand::class_prepared(class, tracking, context));
            }
        });

        let mut waiters = self.prepared_waiters.lock();
        waiters.retain(|waiter| !waiter.is_finished());
        waiters.push(waiter);
    }

    async fn fetch_instances(&self, class: ClassDescriptor, context: Option<SuspendContextRef>) {
        match self.debuggee.instances(&class, None).await {
            Ok(instances) => {
                if context.as_ref().is_some_and(|ctx| !self.is_current(ctx)) {
                    debug!("Dropping instances of {} from stale context", class);
                    return;
                }
                self.ui.send(ViewUpdate::Instances { class, instances });
            }
            Err(e) => warn!("Failed to fetch instances of {}: {}", class, e),
        }
    }

    fn dispose(&self) {
        if let Some(id) = self.tracker_listener.lock().take() {
            self.tracker.remove_listener(id);
        }
        self.alarm.cancel_all();
        for command in self.scheduler.shutdown() {
            // Busy(true) went out when the census was queued
            if matches!(command.action, CommandAction::Census) {
                self.ui.send(ViewUpdate::Busy(false));
            }
        }
        for waiter in self.prepared_waiters.lock().drain(..) {
            waiter.abort();
        }
        self.registry.dispose_all();
    }
}

impl<D: Debuggee> CommandHandler<DebuggerCommand> for ViewCore<D> {
    async fn execute(&self, command: DebuggerCommand) {
        let name = command.name();
        let DebuggerCommand {
            context, action, ..
        } = command;

        if let Some(bound) = &context {
            if !self.is_current(bound) {
                debug!("Cancelling {} command bound to {:?}", name, bound);
                if matches!(action, CommandAction::Census) {
                    self.ui.send(ViewUpdate::Busy(false));
                }
                return;
            }
        }

        match action {
            CommandAction::Census => match context {
                Some(context) => self.run_census(&context).await,
                None => {
                    warn!("Census command without a suspend context");
                    self.ui.send(ViewUpdate::Busy(false));
                }
            },
            CommandAction::TrackClass { class, tracking }
            | CommandAction::ClassPrepared { class, tracking } => {
                self.track_class(class, tracking, context).await
            }
            CommandAction::UntrackClass { name } => self.untrack_class(&name),
            CommandAction::RestoreTracked => self.restore_tracked().await,
            CommandAction::Instances { class } => self.fetch_instances(class, context).await,
        }
    }
}

/// Forwards tracker notifications without keeping the view alive
struct TrackerBridge<D: Debuggee> {
    core: Weak<ViewCore<D>>,
}

impl<D: Debuggee> TrackerListener for TrackerBridge<D> {
    fn class_changed(&self, name: &str, tracking: TrackingType) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        match core.lookup.lookup(name) {
            Some(class) => {
                let context = core.session.suspend_context();
                core.schedule(DebuggerCommand::track_class(class, tracking, context));
            }
            None => debug!("{} is not a known class, ignoring", name),
        }
    }

    fn class_removed(&self, name: &str) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        core.schedule(DebuggerCommand::untrack_class(name));
    }
}

/// Public face of the engine for one debug session
pub struct ClassesView<D: Debuggee> {
    core: Arc<ViewCore<D>>,
    observer: Arc<SessionLifecycleObserver<D>>,
    disposed: AtomicBool,
}

impl<D: Debuggee> ClassesView<D> {
    /// Wire up a view; must be called inside a tokio runtime
    pub fn new(services: ViewServices<D>, options: ViewOptions) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| MemoryViewError::NoRuntime)?;
        let ViewServices {
            debuggee,
            session,
            tracker,
            ui,
            lookup,
        } = services;

        let core = Arc::new_cyclic(|weak: &Weak<ViewCore<D>>| {
            let on_fire = weak.clone();
            let alarm = AdaptiveAlarm::with_runtime(runtime, Duration::ZERO, move || {
                if let Some(core) = on_fire.upgrade() {
                    core.on_alarm();
                }
            });

            ViewCore {
                debuggee,
                session: Arc::clone(&session),
                tracker,
                ui,
                lookup,
                scheduler: CommandScheduler::new(),
                alarm,
                registry: TrackingRegistry::new(),
                census: ClassCensusEngine::new(options.batch_size),
                need_reload: AtomicBool::new(false),
                last_census_context: Mutex::new(None),
                tracker_listener: Mutex::new(None),
                prepared_waiters: Mutex::new(Vec::new()),
                weak_self: weak.clone(),
            }
        });

        // The worker holds only a weak handle and exits on shutdown
        core.scheduler.start(Arc::downgrade(&core));
        core.schedule(DebuggerCommand::restore_tracked());

        core.ui.send(ViewUpdate::Filters {
            diff_only: options.show_with_diff_only,
            instances_only: options.show_with_instances_only,
        });
        core.ui.send(ViewUpdate::Status(if session.is_suspended() {
            StatusText::NothingToShow
        } else {
            StatusText::Running
        }));

        let observer = SessionLifecycleObserver::attach(Arc::downgrade(&core), &session);

        Ok(Self {
            core,
            observer,
            disposed: AtomicBool::new(false),
        })
    }

    /// Raise or clear the "reload needed" flag
    ///
    /// Raising it while paused under a context that has not been counted
    /// yet requests a census.
    pub fn set_need_reload(&self, value: bool) {
        if self.core.need_reload.swap(value, Ordering::AcqRel) == value || !value {
            return;
        }
        if let Some(context) = self.core.session.suspend_context() {
            let counted = self.core.last_census_context.lock().as_ref() == Some(&context);
            if !counted {
                self.core.update_classes_and_counts();
            }
        }
    }

    pub fn update_classes_and_counts(&self) {
        self.core.update_classes_and_counts();
    }

    /// Fetch live instances of `class`; returns false when not paused
    pub fn select_class(&self, class: &ClassDescriptor) -> bool {
        let Some(context) = self.core.session.suspend_context() else {
            debug!("Ignoring selection of {} while running", class);
            return false;
        };
        self.core
            .schedule(DebuggerCommand::instances(class.clone(), context));
        true
    }

    pub fn set_filters(&self, diff_only: bool, instances_only: bool) {
        self.core.ui.send(ViewUpdate::Filters {
            diff_only,
            instances_only,
        });
    }

    pub fn strategy(&self, class: &ClassDescriptor) -> Option<TrackedStrategy> {
        self.core.registry.strategy(class)
    }

    pub fn is_tracking_active(&self, class: &ClassDescriptor) -> bool {
        self.core.registry.is_tracking_active(class)
    }

    pub fn registry(&self) -> &TrackingRegistry {
        &self.core.registry
    }

    pub fn alarm_delay(&self) -> Duration {
        self.core.alarm.delay()
    }

    pub fn has_pending_census_request(&self) -> bool {
        self.core.alarm.has_pending()
    }

    /// Commands accepted by the scheduler so far
    pub fn scheduled_count(&self) -> u64 {
        self.core.scheduler.scheduled_count()
    }

    pub fn is_subscribed_to_tracker(&self) -> bool {
        self.core.tracker_listener.lock().is_some()
    }

    /// Detach from the session and tracker, stop the worker and dispose
    /// every strategy; later calls do nothing
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Disposing classes view");
        self.observer.detach();
        self.core.dispose();
    }
}

impl<D: Debuggee> Drop for ClassesView<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
