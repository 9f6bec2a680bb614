use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use synaptic_core::{Document, Loader, SynapticError};

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn new_document_has_empty_metadata() {
    let doc = Document::new(fields(json!({"id": "1"})));
    assert_eq!(doc.content()["id"], json!("1"));
    assert!(doc.metadata().is_empty());
}

#[test]
fn metadata_str_reads_string_entries() {
    let mut metadata = HashMap::new();
    metadata.insert("database".to_string(), json!("(default)"));
    metadata.insert("count".to_string(), json!(3));
    let doc = Document::with_metadata(Map::new(), metadata);

    assert_eq!(doc.metadata_str("database"), Some("(default)"));
    assert_eq!(doc.metadata_str("count"), None);
    assert_eq!(doc.metadata_str("missing"), None);
}

#[test]
fn into_parts_returns_content_and_metadata() {
    let mut metadata = HashMap::new();
    metadata.insert("collection".to_string(), json!("restaurants"));
    let doc = Document::with_metadata(fields(json!({"a": {"b": [1, 2]}})), metadata.clone());

    let (content, meta) = doc.into_parts();
    assert_eq!(content["a"]["b"], json!([1, 2]));
    assert_eq!(meta, metadata);
}

#[test]
fn serde_skips_empty_metadata() {
    let doc = Document::new(fields(json!({"id": "1"})));
    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value, json!({"content": {"id": "1"}}));

    let back: Document = serde_json::from_value(value).unwrap();
    assert_eq!(back, doc);
}

struct FixedLoader(Result<Vec<Document>, String>);

#[async_trait]
impl Loader for FixedLoader {
    async fn load(&self) -> Result<Vec<Document>, SynapticError> {
        self.0.clone().map_err(SynapticError::Loader)
    }
}

#[tokio::test]
async fn lazy_load_yields_loaded_documents_in_order() {
    let loader = FixedLoader(Ok(vec![
        Document::new(fields(json!({"n": 1}))),
        Document::new(fields(json!({"n": 2}))),
    ]));

    let docs: Vec<_> = loader.lazy_load().collect().await;
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].as_ref().unwrap().content()["n"], json!(1));
    assert_eq!(docs[1].as_ref().unwrap().content()["n"], json!(2));
}

#[tokio::test]
async fn lazy_load_yields_single_error() {
    let loader = FixedLoader(Err("boom".to_string()));
    let items: Vec<_> = loader.lazy_load().collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(SynapticError::Loader(msg)) if msg == "boom"));
}
