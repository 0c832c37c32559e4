// ── Snapshot streams ──
//
// `Stream` view over a DataStore collection: one item per published
// snapshot, ordered by MAC.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Ends once the owning store is dropped. Snapshots published faster than
/// the consumer polls are coalesced into the latest one.
pub struct SnapshotStream<T: Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> SnapshotStream<T> {
    /// Skips the snapshot current at subscription time.
    pub(crate) fn changes(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        Self {
            inner: WatchStream::from_changes(receiver),
        }
    }
}

impl<T: Send + Sync + 'static> Stream for SnapshotStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
