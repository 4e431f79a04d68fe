use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use central_sdk::objects::InstallationId;

/// Organisation login to installation id.
///
/// Always replaced wholesale; lookups never see a half-built map.
#[derive(Debug, Default)]
pub struct ScopeDirectory {
    entries: RwLock<HashMap<String, InstallationId>>,
    generation: AtomicU64,
    pub(super) rebuild_lock: tokio::sync::Mutex<()>,
}

impl ScopeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, org: &str) -> Option<InstallationId> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(org)
            .copied()
    }

    pub fn replace(&self, entries: HashMap<String, InstallationId>) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = entries;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Incremented on every [`replace`](Self::replace).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
