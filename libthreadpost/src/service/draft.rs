//! Draft persistence
//!
//! Keeps the not-yet-posted thread in local state so it survives restarts.
//! The store never fails its callers: storage and parse problems are logged
//! and the operation degrades to a no-op (or to "no drafts" on load).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{LocalStore, DRAFTS_KEY};
use crate::types::PostDraft;

/// Quiet period used by front ends before saving an edit
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Draft store
///
/// A plain synchronous save/load/clear over one key of the local store.
#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn LocalStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Persist the non-blank drafts, or delete the record if there are none
    pub fn save(&self, drafts: &[PostDraft]) {
        let mut kept: Vec<&PostDraft> = drafts.iter().filter(|d| !d.is_blank()).collect();
        kept.sort_by_key(|d| d.index);

        if kept.is_empty() {
            self.clear();
            return;
        }

        let json = match serde_json::to_string(&kept) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize drafts: {}", e);
                return;
            }
        };

        match self.store.set(DRAFTS_KEY, &json) {
            Ok(()) => debug!("Saved {} draft(s)", kept.len()),
            Err(e) => warn!("Could not save drafts: {}", e),
        }
    }

    /// Restore saved drafts ordered by position
    ///
    /// Missing, unreadable, malformed or non-array records all load as an
    /// empty list.
    pub fn load(&self) -> Vec<PostDraft> {
        let raw = match self.store.get(DRAFTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Could not load drafts: {}", e);
                return Vec::new();
            }
        };

        let mut drafts: Vec<PostDraft> = match serde_json::from_str(&raw) {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!("Ignoring unreadable saved drafts: {}", e);
                return Vec::new();
            }
        };

        drafts.retain(|d| !d.is_blank());
        drafts.sort_by_key(|d| d.index);
        drafts.dedup_by_key(|d| d.index);
        drafts
    }

    /// Delete the persisted record
    pub fn clear(&self) {
        match self.store.remove(DRAFTS_KEY) {
            Ok(()) => debug!("Cleared saved drafts"),
            Err(e) => warn!("Could not clear drafts: {}", e),
        }
    }
}

/// Runs an action once input has been quiet for a while
///
/// Each `schedule` call cancels the previously pending action. Must be used
/// inside a tokio runtime.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
