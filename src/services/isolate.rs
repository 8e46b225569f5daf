// src/services/isolate.rs

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::Change;

/// Cache key for a previously produced build artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IsolateKey {
    pub builder: String,
    pub change_id: String,
    pub target: String,
}

impl IsolateKey {
    pub fn new(builder: &str, change: &Change, target: &str) -> Self {
        Self {
            builder: builder.to_string(),
            change_id: change.id(),
            target: target.to_string(),
        }
    }
}

/// Isolate server + hash pair pointing at a build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isolate {
    pub server: String,
    pub hash: String,
}

/// Lookup table of build artifacts keyed by `(builder, change, target)`.
///
/// Lookups happen during evaluation, so implementations must be cheap and
/// must not block on the network.
pub trait IsolateCache: Send + Sync + Debug {
    fn get(&self, key: &IsolateKey) -> Option<Isolate>;
    fn put(&self, key: IsolateKey, isolate: Isolate);
}

/// Process-local [`IsolateCache`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryIsolateCache {
    entries: Arc<RwLock<HashMap<IsolateKey, Isolate>>>,
}

impl InMemoryIsolateCache {
    pub fn new() -> Self {
        Self::default()
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

impl IsolateCache for InMemoryIsolateCache {
    fn get(&self, key: &IsolateKey) -> Option<Isolate> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let hit = entries.get(key).cloned();
        debug!(
            builder = %key.builder,
            change = %key.change_id,
            target = %key.target,
            hit = hit.is_some(),
            "isolate cache lookup"
        );
        hit
    }

    fn put(&self, key: IsolateKey, isolate: Isolate) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, isolate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Commit;

    #[test]
    fn lookup_is_keyed_by_builder_change_and_target() {
        let cache = InMemoryIsolateCache::new();
        let change = Change::from_commits([Commit::new("chromium", "7c7e90be")]);
        cache.put(
            IsolateKey::new("Mac Builder", &change, "telemetry_perf_tests"),
            Isolate {
                server: "https://isolate.server".to_string(),
                hash: "7c7e90be".to_string(),
            },
        );

        assert!(cache
            .get(&IsolateKey::new("Mac Builder", &change, "telemetry_perf_tests"))
            .is_some());
        assert!(cache
            .get(&IsolateKey::new("Linux Builder", &change, "telemetry_perf_tests"))
            .is_none());
        assert!(cache
            .get(&IsolateKey::new("Mac Builder", &change, "other_target"))
            .is_none());
    }
}
