// ── Reactive keyed collection ──
//
// DashMap storage keyed by MAC with a watch-broadcast snapshot that is
// rebuilt on every mutation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::MacAddress;

/// Snapshots are ordered by key so consumers see a stable listing.
pub(crate) struct Collection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<MacAddress, Arc<T>>,
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Collection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Upsert every item, then drop keys absent from `items`. Readers
    /// never observe an empty intermediate state.
    pub(crate) fn replace_all(&self, items: Vec<(MacAddress, T)>) {
        let incoming: std::collections::HashSet<MacAddress> =
            items.iter().map(|(k, _)| k.clone()).collect();
        for (key, entity) in items {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.by_key.retain(|k, _| incoming.contains(k));
        self.rebuild_snapshot();
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(MacAddress, Arc<T>)> = self
            .by_key
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
