// Per-class instance tracking
//
// A tracked class has exactly one strategy: either a diff of its live
// instance set between pauses, or a record of objects constructed since
// tracking began.

mod constructor;
mod instances;
mod registry;

pub use constructor::ConstructorInstanceTracker;
pub use instances::InstanceTrackingStrategy;
pub use registry::{TrackedStrategy, TrackingRegistry};

use crate::model::InstanceHandle;

/// What the presentation layer can ask any strategy
pub trait TrackerForNewInstances: Send + Sync {
    /// Instances the strategy considers new for the current pause
    fn new_instances(&self) -> Vec<InstanceHandle>;

    fn count(&self) -> usize;

    /// False until the strategy has produced its first result
    fn is_ready(&self) -> bool;
}
