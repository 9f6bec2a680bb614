use std::pin::Pin;

use futures::{Stream, StreamExt};
use synaptic_core::SynapticError;
use tokio::runtime::Runtime;

use crate::DocumentSnapshot;

/// Async stream of snapshots produced by a [`CollectionReference`].
pub type SnapshotStream<'a> =
    Pin<Box<dyn Stream<Item = Result<DocumentSnapshot, SynapticError>> + Send + 'a>>;

/// Blocking iterator of snapshots produced by a [`CollectionReference`].
pub type SnapshotIter<'a> =
    Box<dyn Iterator<Item = Result<DocumentSnapshot, SynapticError>> + Send + 'a>;

// ---------------------------------------------------------------------------
// Client capabilities
// ---------------------------------------------------------------------------

/// A handle to a Firestore database.
///
/// Implemented by [`FirestoreRestClient`](crate::FirestoreRestClient) and
/// [`InMemoryFirestore`](crate::InMemoryFirestore); implement it to inject
/// any other client into a [`FirestoreLoader`](crate::FirestoreLoader).
pub trait FirestoreClient: Send + Sync {
    /// Resolve a collection by name. Existence is not checked here; a
    /// missing collection surfaces (or streams nothing) at iteration time.
    fn collection(&self, name: &str) -> Box<dyn CollectionReference>;
}

/// A named collection that can be drained into [`DocumentSnapshot`]s.
pub trait CollectionReference: Send + Sync {
    /// The collection id this reference was resolved with.
    fn id(&self) -> &str;

    /// Stream every document in the collection.
    fn stream(&self) -> SnapshotStream<'_>;

    /// Iterate every document in the collection, blocking the calling
    /// thread. Default implementation drives [`stream`](Self::stream) on a
    /// private runtime.
    fn stream_blocking(&self) -> SnapshotIter<'_> {
        block_on_stream(self.stream())
    }
}

// ---------------------------------------------------------------------------
// Blocking adapter
// ---------------------------------------------------------------------------

/// Turn a snapshot stream into a blocking iterator.
///
/// The stream is polled on a dedicated current-thread runtime. When the
/// calling thread already carries a Tokio runtime context (a worker or a
/// `spawn_blocking` thread), that runtime cannot be entered again here, so
/// the stream is drained up to its first error on a scoped thread instead
/// and the collected snapshots are returned.
pub fn block_on_stream(stream: SnapshotStream<'_>) -> SnapshotIter<'_> {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            return Box::new(std::iter::once(Err(SynapticError::Config(format!(
                "cannot start blocking runtime: {e}"
            )))))
        }
    };

    if tokio::runtime::Handle::try_current().is_err() {
        return Box::new(BlockingSnapshots { runtime, stream });
    }

    let drained = std::thread::scope(|scope| {
        scope
            .spawn(move || runtime.block_on(drain(stream)))
            .join()
    });
    match drained {
        Ok(snapshots) => Box::new(snapshots.into_iter()),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn drain(
    mut stream: SnapshotStream<'_>,
) -> Vec<Result<DocumentSnapshot, SynapticError>> {
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        let failed = item.is_err();
        items.push(item);
        if failed {
            break;
        }
    }
    items
}

struct BlockingSnapshots<'a> {
    runtime: Runtime,
    stream: SnapshotStream<'a>,
}

impl Iterator for BlockingSnapshots<'_> {
    type Item = Result<DocumentSnapshot, SynapticError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
