use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use synaptic_core::{Document, Loader, SynapticError};

use crate::client::{CollectionReference, FirestoreClient};
use crate::{DocumentSnapshot, FirestoreConfig};

/// Load every document of a Firestore collection into Synaptic [`Document`]s.
///
/// Each document becomes one `Document` whose content is the document's
/// field map, nested maps and arrays included. Metadata records where the
/// document was read from:
///
/// ```json
/// {"database": "(default)", "collection": "restaurants"}
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use synaptic_core::Loader;
/// use synaptic_firestore::{FirestoreConfig, FirestoreLoader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FirestoreConfig::new("my-project", "restaurants")
///     .with_credentials_path("service-account.json");
/// let loader = FirestoreLoader::new(config)?;
///
/// let docs = loader.load().await?;
/// for doc in &docs {
///     println!("{:?}", doc.content());
/// }
/// # Ok(())
/// # }
/// ```
pub struct FirestoreLoader {
    config: FirestoreConfig,
    client: Arc<dyn FirestoreClient>,
    collection: Box<dyn CollectionReference>,
}

impl FirestoreLoader {
    /// Create a loader backed by the REST client, initializing the
    /// process-wide auth app on first use.
    pub fn new(config: FirestoreConfig) -> Result<Self, SynapticError> {
        config.validate()?;
        let client = default_client(&config)?;
        Ok(Self::assemble(config, client))
    }

    /// Create a loader around an existing client. No credentials are read
    /// and the auth app is left untouched.
    pub fn from_client(
        config: FirestoreConfig,
        client: Arc<dyn FirestoreClient>,
    ) -> Result<Self, SynapticError> {
        config.validate()?;
        Ok(Self::assemble(config, client))
    }

    fn assemble(config: FirestoreConfig, client: Arc<dyn FirestoreClient>) -> Self {
        let collection = client.collection(&config.collection);
        Self {
            config,
            client,
            collection,
        }
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn FirestoreClient> {
        &self.client
    }

    /// Load every document, blocking the calling thread.
    ///
    /// Returns the same documents, in the same order, as [`Loader::load`].
    /// From async code, call it through `tokio::task::spawn_blocking`.
    pub fn load_blocking(&self) -> Result<Vec<Document>, SynapticError> {
        let docs = self
            .collection
            .stream_blocking()
            .map(|snapshot| snapshot.map(|s| self.convert(s)))
            .collect::<Result<Vec<_>, _>>()?;
        self.log_loaded(docs.len());
        Ok(docs)
    }

    fn convert(&self, snapshot: DocumentSnapshot) -> Document {
        document_from_snapshot(
            snapshot,
            &self.config.database,
            &self.config.collection,
            self.config.include_snapshot_metadata,
        )
    }

    fn log_loaded(&self, count: usize) {
        tracing::debug!(
            "FirestoreLoader: loaded {count} documents from {}/{}",
            self.config.database,
            self.collection.id()
        );
    }
}

#[async_trait]
impl Loader for FirestoreLoader {
    async fn load(&self) -> Result<Vec<Document>, SynapticError> {
        let docs: Vec<Document> = self
            .collection
            .stream()
            .map_ok(|snapshot| self.convert(snapshot))
            .try_collect()
            .await?;
        self.log_loaded(docs.len());
        Ok(docs)
    }
}

/// Convert one snapshot into a [`Document`].
///
/// Content is the snapshot's field map, untouched. Metadata carries
/// `database` and `collection`; with `include_snapshot` it also carries
/// `id`, `path`, and `create_time`/`update_time` when the snapshot has them.
pub fn document_from_snapshot(
    snapshot: DocumentSnapshot,
    database: &str,
    collection: &str,
    include_snapshot: bool,
) -> Document {
    let mut metadata = HashMap::new();
    metadata.insert("database".to_string(), Value::String(database.to_string()));
    metadata.insert(
        "collection".to_string(),
        Value::String(collection.to_string()),
    );

    if include_snapshot {
        metadata.insert("id".to_string(), Value::String(snapshot.id().to_string()));
        metadata.insert(
            "path".to_string(),
            Value::String(snapshot.path().to_string()),
        );
        if let Some(t) = snapshot.create_time() {
            metadata.insert("create_time".to_string(), Value::String(t.to_string()));
        }
        if let Some(t) = snapshot.update_time() {
            metadata.insert("update_time".to_string(), Value::String(t.to_string()));
        }
    }

    Document::with_metadata(snapshot.into_fields(), metadata)
}

#[cfg(feature = "rest")]
fn default_client(config: &FirestoreConfig) -> Result<Arc<dyn FirestoreClient>, SynapticError> {
    let app = crate::auth::ensure_initialized(config.credentials_path.as_deref())?;

    let project_id = if config.project_id.is_empty() {
        app.credentials()
            .project_id()
            .map(str::to_string)
            .ok_or_else(|| {
                SynapticError::Config(
                    "FirestoreLoader: project_id not set and the credentials carry none"
                        .to_string(),
                )
            })?
    } else {
        config.project_id.clone()
    };

    let mut client = crate::FirestoreRestClient::new(app, project_id, &config.database)?
        .with_page_size(config.page_size);
    if let Some(url) = &config.base_url {
        client = client.with_base_url(url);
    }
    Ok(Arc::new(client))
}

#[cfg(not(feature = "rest"))]
fn default_client(_config: &FirestoreConfig) -> Result<Arc<dyn FirestoreClient>, SynapticError> {
    Err(SynapticError::Config(
        "FirestoreLoader: no client injected and synaptic-firestore was built without the \
         `rest` feature (reqwest Firestore client); enable it or use FirestoreLoader::from_client"
            .to_string(),
    ))
}
