// Memory view engine for JVM debug sessions
//
// Keeps a per-class live instance census of a paused debuggee and tracks
// selected classes' instance lifecycles:
// - Serialized, prioritized command worker
// - Latency-adaptive batched instance counting
// - Diff and constructor-based instance tracking
// - Session lifecycle handling with stale-result discarding

pub mod alarm;
pub mod census;
pub mod command;
pub mod config;
pub mod debuggee;
pub mod error;
pub mod jdwp;
pub mod lifecycle;
pub mod listeners;
pub mod model;
pub mod presentation;
pub mod scheduler;
pub mod session;
pub mod suspend;
pub mod testing;
pub mod tracker;
pub mod tracking;
pub mod view;

pub use alarm::AdaptiveAlarm;
pub use census::{CensusOutcome, ClassCensusEngine};
pub use config::MemoryViewConfig;
pub use debuggee::{ClassPreparedSubscription, CreationFeed, Debuggee};
pub use error::{MemoryViewError, Result};
pub use jdwp::JdwpDebuggee;
pub use lifecycle::SessionLifecycleObserver;
pub use model::{CensusRow, CensusSnapshot, ClassDescriptor, InstanceHandle, TrackingType};
pub use presentation::{ClassIndex, ClassLookup, ClassesTable, StatusText, ViewHandle, ViewUpdate};
pub use scheduler::{CommandScheduler, Priority};
pub use session::{DebugSession, SessionListener, SessionState};
pub use suspend::SuspendContextRef;
pub use tracker::{InstancesTracker, TrackerListener};
pub use tracking::{
    ConstructorInstanceTracker, InstanceTrackingStrategy, TrackedStrategy, TrackerForNewInstances,
    TrackingRegistry,
};
pub use view::{ClassesView, ViewOptions, ViewServices};
