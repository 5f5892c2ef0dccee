// Core data model: classes, instances, tracking modes and census rows

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A loaded class: qualified name plus the backend's identity for it
///
/// Two descriptors with the same name but different ids are different
/// classes (e.g. the same class loaded by two class loaders).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassDescriptor {
    name: Arc<str>,
    id: u64,
}

impl ClassDescriptor {
    pub fn new(name: impl Into<Arc<str>>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.name, self.id)
    }
}

/// Opaque reference to a live object; only ever compared and counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceHandle(pub u64);

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingType {
    /// Diff the live-instance set against the previous snapshot
    DiffTracked,
    /// Record objects constructed after tracking began
    CreationTracked,
}

impl FromStr for TrackingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diff" | "identity" | "diff_tracked" => Ok(TrackingType::DiffTracked),
            "new" | "creation" | "creation_tracked" => Ok(TrackingType::CreationTracked),
            other => Err(format!("unknown tracking type '{}' (expected diff or new)", other)),
        }
    }
}

impl fmt::Display for TrackingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingType::DiffTracked => write!(f, "diff"),
            TrackingType::CreationTracked => write!(f, "new"),
        }
    }
}

/// One row of a published census
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CensusRow {
    pub class: ClassDescriptor,
    pub count: u64,
    /// previous count minus current count; only for diff-tracked classes
    pub diff: Option<i64>,
    /// new instances reported by the class's tracking strategy, once ready
    pub new_instances: Option<usize>,
}

/// Immutable result of one completed census, aligned with the enumeration order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CensusSnapshot {
    pub rows: Vec<CensusRow>,
}

impl CensusSnapshot {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.rows.iter().map(|row| &row.class)
    }
}
