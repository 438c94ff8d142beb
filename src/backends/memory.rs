use super::{DocumentBackend, Document, Fields, Query, Result, new_document_id, not_found};
use log::trace;
use std::collections::BTreeMap;

/// Keeps every collection in process memory. Nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: BTreeMap<String, BTreeMap<String, Fields>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentBackend for MemoryBackend {
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<String> {
        let id = new_document_id();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        trace!("Inserted {collection}/{id}");
        Ok(id)
    }

    fn update(&mut self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let stored = self
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;
        stored.extend(fields);
        trace!("Updated {collection}/{id}");
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<()> {
        if let Some(documents) = self.collections.get_mut(collection) {
            documents.remove(id);
        }
        trace!("Deleted {collection}/{id}");
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>> {
        let Some(documents) = self.collections.get(&query.collection) else {
            return Ok(Vec::new());
        };
        Ok(query.evaluate(
            documents
                .iter()
                .map(|(id, data)| Document::new(id.as_str(), data.clone())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendError, Filter, NoteError};
    use serde_json::{Value, json};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn update_merges_fields_and_keeps_the_rest() {
        let mut backend = MemoryBackend::new();
        let id = backend
            .insert("notes", fields(json!({"title": "a", "content": "body"})))
            .unwrap();

        backend
            .update("notes", &id, fields(json!({"title": "b"})))
            .unwrap();

        let stored = backend.get("notes", &id).unwrap().unwrap();
        assert_eq!(stored.data["title"], json!("b"));
        assert_eq!(stored.data["content"], json!("body"));
    }

    #[test]
    fn update_of_missing_document_is_not_found() {
        let mut backend = MemoryBackend::new();
        let result = backend.update("notes", "nope", Fields::new());
        assert!(matches!(
            result,
            Err(NoteError::Backend(BackendError::DocumentNotFound { .. }))
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut backend = MemoryBackend::new();
        let id = backend.insert("trash", Fields::new()).unwrap();
        backend.delete("trash", &id).unwrap();
        backend.delete("trash", &id).unwrap();
        backend.delete("never-created", "x").unwrap();
        assert!(backend.get("trash", &id).unwrap().is_none());
    }

    #[test]
    fn query_only_sees_its_own_collection() {
        let mut backend = MemoryBackend::new();
        backend
            .insert("notes", fields(json!({"marked": true})))
            .unwrap();
        backend
            .insert("trash", fields(json!({"marked": true})))
            .unwrap();

        let query = Query::collection("notes").filter(Filter::equals("marked", true));
        assert_eq!(backend.run_query(&query).unwrap().len(), 1);
    }
}
