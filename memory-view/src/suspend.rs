// Suspend episode tokens

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_EPISODE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Episode {
    id: u64,
}

/// Identifies one contiguous pause of the debuggee
///
/// Equality is identity: two refs are equal only if they came from the same
/// pause, regardless of the episode number.
#[derive(Clone)]
pub struct SuspendContextRef(Arc<Episode>);

impl SuspendContextRef {
    pub fn new() -> Self {
        Self(Arc::new(Episode {
            id: NEXT_EPISODE.fetch_add(1, Ordering::Relaxed),
        }))
    }

    pub fn episode(&self) -> u64 {
        self.0.id
    }
}

impl Default for SuspendContextRef {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for SuspendContextRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SuspendContextRef {}

impl fmt::Debug for SuspendContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SuspendContext#{}", self.0.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_identity() {
        let a = SuspendContextRef::new();
        let b = SuspendContextRef::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(b.episode() > a.episode());
    }
}
