//! Registered module records.

use serde::{Deserialize, Serialize};

use attest_kernel_core::{Address, Fingerprint, ModuleId};

use crate::registry::MAX_PAGE_SIZE;

/// A module registration.
///
/// `fingerprint` is captured once, at registration, and never changes.
/// Records are never deleted; retiring a module means deactivating it, so the
/// history of what was trusted stays inspectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Registration id.
    pub id: ModuleId,

    /// Where the module's code is deployed.
    pub reference: Address,

    /// Fingerprint of the code at registration time.
    pub fingerprint: Fingerprint,

    /// Whether lookups may return this module.
    pub active: bool,

    /// When the module was registered (Unix ms).
    pub registered_at: i64,

    /// Free-form description for dashboards.
    pub description: String,

    /// Module type tag, e.g. `"signed-attestation"` or `"compliance"`.
    pub module_type: String,
}

/// One page of ids, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T = ModuleId> {
    pub ids: Vec<T>,
    /// Total number of registrations.
    pub total: usize,
    /// Offset of the next page, if there is one.
    pub next_offset: Option<usize>,
}

impl<T: Clone> Page<T> {
    /// Cut a page out of `all`. `limit` is capped at [`MAX_PAGE_SIZE`].
    pub fn slice(all: &[T], offset: usize, limit: usize) -> Self {
        let total = all.len();
        let start = offset.min(total);
        let end = start.saturating_add(limit.min(MAX_PAGE_SIZE)).min(total);
        Page {
            ids: all[start..end].to_vec(),
            total,
            next_offset: (end < total).then_some(end),
        }
    }
}
