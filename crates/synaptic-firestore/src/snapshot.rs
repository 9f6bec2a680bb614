use serde_json::{Map, Value};

/// A point-in-time read of one Firestore document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    id: String,
    path: String,
    fields: Map<String, Value>,
    create_time: Option<String>,
    update_time: Option<String>,
}

impl DocumentSnapshot {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        let id = id.into();
        Self {
            path: id.clone(),
            id,
            fields,
            create_time: None,
            update_time: None,
        }
    }

    /// Set the document path relative to the database root
    /// (e.g. `restaurants/abc`).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_create_time(mut self, time: impl Into<String>) -> Self {
        self.create_time = Some(time.into());
        self
    }

    pub fn with_update_time(mut self, time: impl Into<String>) -> Self {
        self.update_time = Some(time.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn create_time(&self) -> Option<&str> {
        self.create_time.as_deref()
    }

    pub fn update_time(&self) -> Option<&str> {
        self.update_time.as_deref()
    }

    /// Copy of the document's fields.
    pub fn to_map(&self) -> Map<String, Value> {
        self.fields.clone()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Iterate over the document's fields.
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.fields.iter()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}
