//! Compression quota policies.
//!
//! Signed-in users are unlimited; anonymous use can be capped by counting
//! compressions in the local store. A slot is reserved before the upload
//! and handed back if the compression fails.

use crate::storage::{LocalStore, COMPRESSION_COUNT_KEY};
use std::sync::Arc;
use tracing::warn;

pub trait QuotaPolicy: Send + Sync {
    /// Whether another compression could start right now
    fn may_proceed(&self) -> bool;

    /// Reserve one compression, refusing at the limit.
    ///
    /// The check and the reservation are a single step, so files
    /// submitted together cannot all slip under the limit.
    fn try_acquire(&self) -> bool;

    /// Hand back a reservation whose compression failed
    fn release(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl QuotaPolicy for Unlimited {
    fn may_proceed(&self) -> bool {
        true
    }

    fn try_acquire(&self) -> bool {
        true
    }
}

/// Caps anonymous compressions at `limit`, counted under `compressionCount`
#[derive(Debug, Clone)]
pub struct SessionQuota {
    store: Arc<LocalStore>,
    limit: u32,
}

fn parse_count(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

impl SessionQuota {
    pub fn new(store: Arc<LocalStore>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn used(&self) -> u32 {
        parse_count(self.store.get_item(COMPRESSION_COUNT_KEY).as_deref())
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl QuotaPolicy for SessionQuota {
    fn may_proceed(&self) -> bool {
        self.used() < self.limit
    }

    fn try_acquire(&self) -> bool {
        let limit = self.limit;
        let result = self.store.update_item(COMPRESSION_COUNT_KEY, |current| {
            let n = parse_count(current);
            if n >= limit {
                (current.map(str::to_string), false)
            } else {
                (Some((n + 1).to_string()), true)
            }
        });
        match result {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(error = %e, "Failed to reserve compression quota");
                false
            }
        }
    }

    fn release(&self) {
        let result = self.store.update_item(COMPRESSION_COUNT_KEY, |current| {
            (Some(parse_count(current).saturating_sub(1).to_string()), ())
        });
        if let Err(e) = result {
            warn!(error = %e, "Failed to release compression quota");
        }
    }
}
