//! Process-wide shared state, passed by value instead of reached for as a
//! singleton (spec §9: "global singleton for settings and MIME scanner").
//!
//! `Context` bundles configuration with the two caches §5 calls out as
//! process-wide and read-mostly: the MIME parent-type cache and the known
//! labels cache. Both are protected by a lightweight lock since filter
//! dispatch and index writers may touch them from different tasks.

use std::sync::{Arc, RwLock};

use ahash::AHashMap;

use crate::config::PinotConfig;
use crate::mime::Mime;

/// Shared, cloneable handle threaded through the scanner, filter dispatch and
/// index writer.
#[derive(Clone)]
pub struct Context {
    /// User configuration.
    pub config: Arc<PinotConfig>,
    mime_parent_cache: Arc<RwLock<AHashMap<Mime, Option<Mime>>>>,
    known_labels: Arc<RwLock<AHashMap<String, ()>>>,
}

impl Context {
    /// Builds a context from a loaded configuration.
    pub fn new(config: PinotConfig) -> Context {
        Context {
            config: Arc::new(config),
            mime_parent_cache: Arc::new(RwLock::new(AHashMap::new())),
            known_labels: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Looks up a cached parent-type verdict for `mime`, if any miss or hit
    /// was already recorded. `None` inside `Some` means "no parent applies",
    /// cached so the walk is not repeated (spec §4.2).
    pub fn cached_parent(&self, mime: &Mime) -> Option<Option<Mime>> {
        self.mime_parent_cache.read().unwrap().get(mime).cloned()
    }

    /// Records the parent-type verdict for `mime`.
    pub fn cache_parent(&self, mime: Mime, parent: Option<Mime>) {
        self.mime_parent_cache.write().unwrap().insert(mime, parent);
    }

    /// Replaces the in-process known-labels cache, e.g. after reading the
    /// index's `labels` metadata key.
    pub fn seed_labels<I: IntoIterator<Item = String>>(&self, labels: I) {
        let mut guard = self.known_labels.write().unwrap();
        guard.clear();
        for label in labels {
            guard.insert(label, ());
        }
    }

    /// Adds a label to the in-process cache. Best-effort: callers that fail
    /// to persist the updated label set to the index metadata should still
    /// call this so the process stays consistent with what was written.
    pub fn remember_label(&self, label: &str) {
        self.known_labels
            .write()
            .unwrap()
            .insert(label.to_string(), ());
    }

    /// Returns a snapshot of all known labels.
    pub fn known_labels(&self) -> Vec<String> {
        self.known_labels.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_cache_round_trips() {
        let ctx = Context::new(PinotConfig::default());
        let html: Mime = "text/html".parse().unwrap();
        let plain: Mime = "text/plain".parse().unwrap();
        assert!(ctx.cached_parent(&html).is_none());
        ctx.cache_parent(html.clone(), Some(plain.clone()));
        assert_eq!(ctx.cached_parent(&html), Some(Some(plain)));
    }

    #[test]
    fn labels_are_seeded_and_remembered() {
        let ctx = Context::new(PinotConfig::default());
        ctx.seed_labels(vec!["fav".to_string()]);
        ctx.remember_label("later");
        let mut labels = ctx.known_labels();
        labels.sort();
        assert_eq!(labels, vec!["fav".to_string(), "later".to_string()]);
    }
}
