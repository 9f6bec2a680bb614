use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use synaptic_core::SynapticError;

use crate::auth::FirebaseApp;
use crate::client::{CollectionReference, FirestoreClient, SnapshotStream};
use crate::config::DEFAULT_PAGE_SIZE;
use crate::value::decode_fields;
use crate::DocumentSnapshot;

/// Public Firestore REST endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    update_time: Option<String>,
}

impl RawDocument {
    fn into_snapshot(self) -> DocumentSnapshot {
        let (id, path) = split_document_name(&self.name);
        let mut snapshot = DocumentSnapshot::new(id, decode_fields(self.fields)).with_path(path);
        if let Some(t) = self.create_time {
            snapshot = snapshot.with_create_time(t);
        }
        if let Some(t) = self.update_time {
            snapshot = snapshot.with_update_time(t);
        }
        snapshot
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Percent-encode each `/`-separated segment, keeping sub-collection paths
/// such as `users/u1/orders` intact.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split `projects/p/databases/d/documents/col/id` into `(id, "col/id")`.
fn split_document_name(name: &str) -> (String, String) {
    let path = name
        .split_once("/documents/")
        .map_or(name, |(_, rest)| rest);
    let id = path.rsplit('/').next().unwrap_or(path);
    (id.to_string(), path.to_string())
}

// ---------------------------------------------------------------------------
// FirestoreRestClient
// ---------------------------------------------------------------------------

/// A [`FirestoreClient`] over the Firestore REST API (`documents.list`).
///
/// Collections are listed page by page, following `nextPageToken` until the
/// collection is exhausted. Typed Firestore values are decoded to plain JSON.
///
/// Idle connections are not pooled: a client may be driven by several
/// runtimes over its life (the blocking path builds one per load), and a
/// pooled connection must not outlive the runtime that opened it.
#[derive(Clone)]
pub struct FirestoreRestClient {
    app: Arc<FirebaseApp>,
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    page_size: u32,
}

impl FirestoreRestClient {
    /// Create a client for `project_id`/`database` authenticated by `app`.
    ///
    /// Emulator credentials point the client at the emulator host.
    pub fn new(
        app: Arc<FirebaseApp>,
        project_id: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, SynapticError> {
        let base_url = app
            .credentials()
            .emulator_base_url()
            .unwrap_or_else(|| FIRESTORE_BASE_URL.to_string());
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SynapticError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            app,
            http,
            base_url,
            project_id: project_id.into(),
            database: database.into(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the REST base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the number of documents requested per page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents/{}",
            self.base_url,
            encode_path(&self.project_id),
            encode_path(&self.database),
            encode_path(collection)
        )
    }

    async fn fetch_page(
        &self,
        url: &str,
        page_token: Option<&str>,
    ) -> Result<ListDocumentsResponse, SynapticError> {
        let token = self.app.access_token().await?;
        let mut request = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("pageSize", self.page_size.to_string())]);
        if let Some(pt) = page_token {
            request = request.query(&[("pageToken", pt)]);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| SynapticError::Loader(format!("Firestore list documents: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => format!("{}: {}", envelope.error.status, envelope.error.message),
                Err(_) => text,
            };
            return Err(SynapticError::Loader(format!(
                "Firestore API error ({status}) {detail}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| SynapticError::Loader(format!("Firestore list parse: {e}")))
    }

    fn list<'a>(&'a self, collection: &'a str) -> SnapshotStream<'a> {
        Box::pin(async_stream::stream! {
            let url = self.documents_url(collection);
            let mut page_token: Option<String> = None;
            loop {
                let page = match self.fetch_page(&url, page_token.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                tracing::debug!(
                    "FirestoreRestClient: fetched {} documents from {collection}",
                    page.documents.len()
                );
                for raw in page.documents {
                    yield Ok(raw.into_snapshot());
                }
                match page.next_page_token.filter(|t| !t.is_empty()) {
                    Some(next) => page_token = Some(next),
                    None => break,
                }
            }
        })
    }
}

impl FirestoreClient for FirestoreRestClient {
    fn collection(&self, name: &str) -> Box<dyn CollectionReference> {
        Box::new(RestCollection {
            client: self.clone(),
            id: name.to_string(),
        })
    }
}

struct RestCollection {
    client: FirestoreRestClient,
    id: String,
}

impl CollectionReference for RestCollection {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream(&self) -> SnapshotStream<'_> {
        self.client.list(&self.id)
    }
}
