use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::client::{CollectionReference, FirestoreClient, SnapshotIter, SnapshotStream};
use crate::DocumentSnapshot;

type Collections = Arc<RwLock<HashMap<String, Vec<DocumentSnapshot>>>>;

/// In-memory [`FirestoreClient`] for tests and local pipelines.
///
/// Collections yield documents in insertion order. Clones share the same
/// underlying data, and collection references always read the current
/// contents at iteration time.
#[derive(Clone, Default)]
pub struct InMemoryFirestore {
    collections: Collections,
}

impl InMemoryFirestore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot, replacing any existing document with the same id
    /// in place.
    pub fn insert(&self, collection: &str, snapshot: DocumentSnapshot) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id() == snapshot.id()) {
            Some(existing) => *existing = snapshot,
            None => docs.push(snapshot),
        }
    }

    /// Insert a document built from `fields` with path `{collection}/{id}`.
    pub fn insert_fields(&self, collection: &str, id: &str, fields: Map<String, Value>) {
        let snapshot = DocumentSnapshot::new(id, fields).with_path(format!("{collection}/{id}"));
        self.insert(collection, snapshot);
    }

    /// Remove a document. Returns `true` if it existed.
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(docs) = collections.get_mut(collection) else {
            return false;
        };
        let before = docs.len();
        docs.retain(|d| d.id() != id);
        docs.len() != before
    }

    /// Number of documents currently stored in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, Vec::len)
    }
}

impl FirestoreClient for InMemoryFirestore {
    fn collection(&self, name: &str) -> Box<dyn CollectionReference> {
        Box::new(MemoryCollection {
            collections: Arc::clone(&self.collections),
            id: name.to_string(),
        })
    }
}

struct MemoryCollection {
    collections: Collections,
    id: String,
}

impl MemoryCollection {
    fn snapshot(&self) -> Vec<DocumentSnapshot> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.id)
            .cloned()
            .unwrap_or_default()
    }
}

impl CollectionReference for MemoryCollection {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream(&self) -> SnapshotStream<'_> {
        Box::pin(futures::stream::iter(self.snapshot().into_iter().map(Ok)))
    }

    fn stream_blocking(&self) -> SnapshotIter<'_> {
        Box::new(self.snapshot().into_iter().map(Ok))
    }
}
