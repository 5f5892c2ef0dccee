// Presentation side of the memory view
//
// The engine never touches the table directly. It sends immutable
// `ViewUpdate`s down a channel and whoever owns the table (the CLI loop,
// a test) applies them on its own task.

use crate::model::{CensusRow, CensusSnapshot, ClassDescriptor, InstanceHandle};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusText {
    Running,
    NothingToShow,
}

impl StatusText {
    pub fn message(&self) -> &'static str {
        match self {
            StatusText::Running => "The application is running",
            StatusText::NothingToShow => "Nothing to show",
        }
    }
}

impl fmt::Display for StatusText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    Busy(bool),
    Status(StatusText),
    /// Blank the table; also clears the busy indicator
    HideContent,
    Classes(CensusSnapshot),
    /// Tracking changed; re-sort and redraw what is there
    Refresh,
    Instances {
        class: ClassDescriptor,
        instances: Vec<InstanceHandle>,
    },
    Filters {
        diff_only: bool,
        instances_only: bool,
    },
}

/// Sending half of the worker -> UI handoff
#[derive(Clone)]
pub struct ViewHandle {
    tx: mpsc::UnboundedSender<ViewUpdate>,
}

impl ViewHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ViewUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the UI side is gone
    pub fn send(&self, update: ViewUpdate) -> bool {
        trace!("View update: {:?}", update);
        self.tx.send(update).is_ok()
    }
}

/// Name -> descriptor resolution the presentation side exposes to the engine
pub trait ClassLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<ClassDescriptor>;
}

/// Shared index of the classes currently shown
///
/// With several descriptors for one name, the first in census order wins.
#[derive(Clone, Default)]
pub struct ClassIndex {
    by_name: Arc<RwLock<HashMap<String, ClassDescriptor>>>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace<'a>(&self, classes: impl IntoIterator<Item = &'a ClassDescriptor>) {
        let mut by_name = HashMap::new();
        for class in classes {
            by_name
                .entry(class.name().to_string())
                .or_insert_with(|| class.clone());
        }
        *self.by_name.write() = by_name;
    }

    pub fn len(&self) -> usize {
        self.by_name.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClassLookup for ClassIndex {
    fn lookup(&self, name: &str) -> Option<ClassDescriptor> {
        self.by_name.read().get(name).cloned()
    }
}

/// Table model: rows, busy flag, status text and filters
pub struct ClassesTable {
    snapshot: CensusSnapshot,
    index: ClassIndex,
    busy: bool,
    status: StatusText,
    hidden: bool,
    filter: String,
    diff_only: bool,
    instances_only: bool,
    selected: Option<(ClassDescriptor, Vec<InstanceHandle>)>,
    dirty: bool,
}

impl ClassesTable {
    pub fn new(index: ClassIndex) -> Self {
        Self {
            snapshot: CensusSnapshot::default(),
            index,
            busy: false,
            status: StatusText::Running,
            hidden: true,
            filter: String::new(),
            diff_only: false,
            instances_only: false,
            selected: None,
            dirty: false,
        }
    }

    pub fn index(&self) -> &ClassIndex {
        &self.index
    }

    pub fn apply(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::Busy(busy) => self.busy = busy,
            ViewUpdate::Status(status) => self.status = status,
            ViewUpdate::HideContent => {
                self.hidden = true;
                self.busy = false;
                self.selected = None;
            }
            ViewUpdate::Classes(snapshot) => {
                self.index.replace(snapshot.classes());
                self.snapshot = snapshot;
                self.hidden = false;
            }
            ViewUpdate::Refresh => {}
            ViewUpdate::Instances { class, instances } => {
                self.selected = Some((class, instances));
            }
            ViewUpdate::Filters {
                diff_only,
                instances_only,
            } => {
                self.diff_only = diff_only;
                self.instances_only = instances_only;
            }
        }
        self.dirty = true;
    }

    /// Whether anything changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn status(&self) -> StatusText {
        self.status
    }

    pub fn set_filter_pattern(&mut self, pattern: &str) {
        self.filter = pattern.trim().to_lowercase();
        self.dirty = true;
    }

    pub fn filters(&self) -> (bool, bool) {
        (self.diff_only, self.instances_only)
    }

    pub fn selected(&self) -> Option<(&ClassDescriptor, &[InstanceHandle])> {
        self.selected
            .as_ref()
            .map(|(class, instances)| (class, instances.as_slice()))
    }

    /// Rows passing the filters, largest count first
    pub fn visible_rows(&self) -> Vec<&CensusRow> {
        if self.hidden {
            return Vec::new();
        }

        let mut rows: Vec<&CensusRow> = self
            .snapshot
            .rows
            .iter()
            .filter(|row| self.filter.is_empty() || row.class.name().to_lowercase().contains(&self.filter))
            .filter(|row| !self.diff_only || row.diff.is_some_and(|diff| diff != 0))
            .filter(|row| !self.instances_only || row.count > 0)
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.class.name().cmp(b.class.name()))
        });
        rows
    }

    /// Status text to show instead of rows, if there are none
    pub fn empty_text(&self) -> Option<&'static str> {
        if self.visible_rows().is_empty() {
            Some(self.status.message())
        } else {
            None
        }
    }

    pub fn render(&self) -> String {
        let rows = self.visible_rows();
        let mut output = String::new();
        if self.busy {
            output.push_str("(updating...)\n");
        }
        if rows.is_empty() {
            output.push_str(self.status.message());
            output.push('\n');
            return output;
        }

        output.push_str(&format!("{:<60} {:>10} {:>8} {:>6}\n", "Class", "Count", "Diff", "New"));
        for row in rows {
            let diff = row.diff.map(|d| format!("{:+}", d)).unwrap_or_default();
            let new = row.new_instances.map(|n| n.to_string()).unwrap_or_default();
            output.push_str(&format!(
                "{:<60} {:>10} {:>8} {:>6}\n",
                row.class.name(),
                row.count,
                diff,
                new
            ));
        }
        output
    }
}
