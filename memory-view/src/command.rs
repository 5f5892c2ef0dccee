// Commands the memory view submits to the scheduler
//
// Each command carries its priority and the suspend context it was issued
// under. A command bound to a context that is no longer current when it
// reaches the worker is cancelled instead of executed.

use crate::model::{ClassDescriptor, TrackingType};
use crate::scheduler::{Command, Priority};
use crate::suspend::SuspendContextRef;

#[derive(Debug)]
pub enum CommandAction {
    /// Enumerate classes and publish instance counts
    Census,
    /// Install a tracking strategy for an already loaded class
    TrackClass {
        class: ClassDescriptor,
        tracking: TrackingType,
    },
    /// Stop diff-tracking every class with this name
    UntrackClass { name: String },
    /// A configured class finished loading after the view started
    ClassPrepared {
        class: ClassDescriptor,
        tracking: TrackingType,
    },
    /// Apply the configured tracked classes at view start
    RestoreTracked,
    /// Fetch live instances of a selected class
    Instances { class: ClassDescriptor },
}

#[derive(Debug)]
pub struct DebuggerCommand {
    pub priority: Priority,
    pub context: Option<SuspendContextRef>,
    pub action: CommandAction,
}

impl DebuggerCommand {
    pub fn census(context: SuspendContextRef) -> Self {
        Self {
            priority: Priority::Lowest,
            context: Some(context),
            action: CommandAction::Census,
        }
    }

    pub fn track_class(
        class: ClassDescriptor,
        tracking: TrackingType,
        context: Option<SuspendContextRef>,
    ) -> Self {
        Self {
            priority: Priority::Lowest,
            context,
            action: CommandAction::TrackClass { class, tracking },
        }
    }

    pub fn untrack_class(name: impl Into<String>) -> Self {
        Self {
            priority: Priority::Lowest,
            context: None,
            action: CommandAction::UntrackClass { name: name.into() },
        }
    }

    pub fn class_prepared(
        class: ClassDescriptor,
        tracking: TrackingType,
        context: Option<SuspendContextRef>,
    ) -> Self {
        Self {
            priority: Priority::Lowest,
            context,
            action: CommandAction::ClassPrepared { class, tracking },
        }
    }

    pub fn restore_tracked() -> Self {
        Self {
            priority: Priority::Lowest,
            context: None,
            action: CommandAction::RestoreTracked,
        }
    }

    /// User-initiated, so it goes ahead of background refreshes
    pub fn instances(class: ClassDescriptor, context: SuspendContextRef) -> Self {
        Self {
            priority: Priority::Normal,
            context: Some(context),
            action: CommandAction::Instances { class },
        }
    }

    pub fn name(&self) -> &'static str {
        match self.action {
            CommandAction::Census => "census",
            CommandAction::TrackClass { .. } => "track-class",
            CommandAction::UntrackClass { .. } => "untrack-class",
            CommandAction::ClassPrepared { .. } => "class-prepared",
            CommandAction::RestoreTracked => "restore-tracked",
            CommandAction::Instances { .. } => "instances",
        }
    }
}

impl Command for DebuggerCommand {
    fn priority(&self) -> Priority {
        self.priority
    }
}
