use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{EntryId, KnowledgeBase};

static PROCESS_ALLOCATOR: EntryIdAllocator = EntryIdAllocator::new();

/// Issues entry ids from the wall clock in milliseconds.
///
/// Every id is strictly greater than the previous one issued by the same
/// allocator, so two creations in the same millisecond still differ.
#[derive(Debug, Default)]
pub struct EntryIdAllocator {
    last_issued: AtomicU64,
}

impl EntryIdAllocator {
    /// Create an allocator with no history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_issued: AtomicU64::new(0),
        }
    }

    /// Allocator shared by the whole process.
    #[must_use]
    pub fn process() -> &'static Self {
        &PROCESS_ALLOCATOR
    }

    /// Allocate an id not yet used in `kb`.
    pub fn allocate(&self, kb: &KnowledgeBase) -> EntryId {
        let mut id = self.issue(epoch_millis());
        while kb.contains(EntryId(id)) {
            id = self.issue(id.saturating_add(1));
        }
        EntryId(id)
    }

    fn issue(&self, floor: u64) -> u64 {
        let mut last = self.last_issued.load(Ordering::Acquire);
        loop {
            let next = floor.max(last.saturating_add(1));
            match self.last_issued.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

fn epoch_millis() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}
