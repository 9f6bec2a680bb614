use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for the Synaptic framework.
#[derive(Debug, Error)]
pub enum SynapticError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("loader error: {0}")]
    Loader(String),
    #[error("config error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A loaded record: the raw field mapping of one source document plus
/// metadata describing where it came from.
///
/// Fields are read-only once constructed; use [`Document::into_parts`] to
/// take ownership of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    content: Map<String, Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(content: Map<String, Value>) -> Self {
        Self {
            content,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(content: Map<String, Value>, metadata: HashMap<String, Value>) -> Self {
        Self { content, metadata }
    }

    /// The raw field-to-value mapping of the source document.
    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Look up a single metadata entry as a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn into_parts(self) -> (Map<String, Value>, HashMap<String, Value>) {
        (self.content, self.metadata)
    }
}

// ---------------------------------------------------------------------------
// Loader trait
// ---------------------------------------------------------------------------

/// Trait for loading documents from various sources.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load all documents from this source.
    async fn load(&self) -> Result<Vec<Document>, SynapticError>;

    /// Stream documents lazily. Default implementation wraps load().
    fn lazy_load(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Document, SynapticError>> + Send + '_>> {
        Box::pin(async_stream::stream! {
            match self.load().await {
                Ok(docs) => {
                    for doc in docs {
                        yield Ok(doc);
                    }
                }
                Err(e) => yield Err(e),
            }
        })
    }
}
