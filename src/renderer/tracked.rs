use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global resource id generator.
static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// GPU object with a process-unique id.
///
/// wgpu handles have no stable identity of their own; the id lets callers
/// tell whether a shadow map was reallocated between frames.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    inner: T,
    id: u64,
}

impl<T> Tracked<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            id: next_id(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True if both wrap the same allocation.
    #[inline]
    #[must_use]
    pub fn same_resource(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
