pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

pub use crate::{BackendError, Document, Fields, NoteError, Query, Result};

/// Trait to be implemented by all backends that store documents in named collections
pub trait DocumentBackend: Send {
    /// Stores a new document in `collection` and returns its freshly assigned ID
    ///
    /// # Errors
    ///
    /// Returns an error if the document could not be inserted
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<String>;

    /// Merges `fields` into an existing document. Fields not named are kept
    ///
    /// # Errors
    ///
    /// Returns `BackendError::DocumentNotFound` if there is no such document,
    /// or another error if the write fails
    fn update(&mut self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Deletes a document. Deleting a document that does not exist is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails
    fn delete(&mut self, collection: &str, id: &str) -> Result<()>;

    /// Fetches a single document by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored data is corrupted
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Returns the documents selected by `query`, in query order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    fn run_query(&self, query: &Query) -> Result<Vec<Document>>;
}

/// Fresh opaque document ID
pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn not_found(collection: &str, id: &str) -> NoteError {
    NoteError::Backend(BackendError::DocumentNotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    })
}
