use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Identifies one in-flight lookup. Only the newest ticket may publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupTicket(u64);

/// Generation counter guarding asynchronous lookups against stale results: a
/// response that resolves after a newer lookup started is discarded.
#[derive(Debug, Default)]
pub struct LookupGeneration {
    current: AtomicU64,
}

impl LookupGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> LookupTicket {
        LookupTicket(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: LookupTicket) -> bool {
        self.current.load(Ordering::Acquire) == ticket.0
    }

    /// Writes `value` into `slot` only when `ticket` is still the newest.
    pub fn commit_if_current<T>(&self, ticket: LookupTicket, slot: &mut T, value: T) -> bool {
        if !self.is_current(ticket) {
            debug!(
                event_name = "variants.lookup.stale_dropped",
                ticket = ticket.0,
                "dropping result of superseded lookup"
            );
            return false;
        }

        *slot = value;
        true
    }
}
