use std::path::PathBuf;

use synaptic_core::SynapticError;

/// Name Firestore reserves for a project's default database.
pub const FIRESTORE_DEFAULT_DB: &str = "(default)";

/// Number of documents requested per listing page by the REST client.
pub const DEFAULT_PAGE_SIZE: u32 = 300;

// ---------------------------------------------------------------------------
// FirestoreConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`FirestoreLoader`](crate::FirestoreLoader).
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Google Cloud project ID. When empty, the project recorded in the
    /// credentials is used.
    pub project_id: String,
    /// Collection to load. Must not be empty.
    pub collection: String,
    /// Path to a service account or authorized user credentials file.
    /// When `None`, Application Default Credentials are used.
    pub credentials_path: Option<PathBuf>,
    /// Database name (default: `(default)`).
    pub database: String,
    /// Override the Firestore REST endpoint (e.g. a local emulator).
    pub base_url: Option<String>,
    /// Documents fetched per REST page (default: 300).
    pub page_size: u32,
    /// Also copy the snapshot's id, path and timestamps into metadata.
    pub include_snapshot_metadata: bool,
}

impl FirestoreConfig {
    /// Create a new config for the given project and collection.
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collection: collection.into(),
            credentials_path: None,
            database: FIRESTORE_DEFAULT_DB.to_string(),
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            include_snapshot_metadata: false,
        }
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Authenticate with the credentials file at `path`.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Set the Firestore REST base URL (default: `https://firestore.googleapis.com/v1`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the number of documents requested per REST page.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Include `id`, `path`, `create_time` and `update_time` in each
    /// document's metadata.
    pub fn with_snapshot_metadata(mut self, enabled: bool) -> Self {
        self.include_snapshot_metadata = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SynapticError> {
        if self.collection.trim().is_empty() {
            return Err(SynapticError::Validation(
                "collection_name must be provided".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(SynapticError::Validation(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
