#![deny(clippy::cargo)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::nursery)]
#![deny(clippy::perf)]
#![deny(clippy::style)]
#![deny(clippy::suspicious)]
#![deny(clippy::pedantic)]

use serde_json::Value;
use std::fmt;
use std::io;
use thiserror::Error;

pub mod app;
pub mod backends;
pub mod database;
pub mod document;
pub mod setup;
pub mod ui;

pub use app::{LIST_LIMIT, NoteList, NoteStore};
pub use database::{Database, ListenerRegistration};
pub use document::{ChangeKind, Document, DocumentChange, Fields, Filter, Query, QuerySnapshot};

// More convenient Result type
pub type Result<T> = std::result::Result<T, NoteError>;

/// Which logical collection a note belongs to, as stored in its `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoteKind {
    #[default]
    Note,
    Trash,
}

impl NoteKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Trash => "trash",
        }
    }

    // "note" (or nothing at all) is a regular note, every other tag means trash
    fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None | Some("" | "note") => Self::Note,
            Some(_) => Self::Trash,
        }
    }
}

impl fmt::Display for NoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two collections notes are stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionId {
    Notes,
    Trash,
}

impl CollectionId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Trash => "trash",
        }
    }

    /// The collection a note of the given kind is physically stored in
    #[must_use]
    pub const fn for_kind(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Note => Self::Notes,
            NoteKind::Trash => Self::Trash,
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single note. `id` is assigned by the database and absent until the note is persisted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Note {
    pub id: Option<String>,
    pub kind: NoteKind,
    pub title: String,
    pub content: String,
    pub marked: bool,
}

impl Note {
    /// An unsaved, unmarked regular note
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: NoteKind::Note,
            title: title.into(),
            content: content.into(),
            marked: false,
        }
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: NoteKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn with_marked(mut self, marked: bool) -> Self {
        self.marked = marked;
        self
    }

    /// Builds a note from a raw stored document, filling in defaults for
    /// missing or mistyped fields
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        let data = &document.data;
        let text = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            id: Some(document.id.clone()),
            kind: NoteKind::from_tag(data.get("type").and_then(Value::as_str)),
            title: text("title"),
            content: text("content"),
            marked: data.get("marked").and_then(Value::as_bool).unwrap_or(false),
        }
    }

    /// The writable fields of the note. Never contains the id
    #[must_use]
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("type".into(), Value::from(self.kind.as_str()));
        fields.insert("title".into(), Value::from(self.title.as_str()));
        fields.insert("content".into(), Value::from(self.content.as_str()));
        fields.insert("marked".into(), Value::from(self.marked));
        fields
    }

    /// The collection this note belongs in according to its `type`
    #[must_use]
    pub const fn collection(&self) -> CollectionId {
        CollectionId::for_kind(self.kind)
    }
}

// Enum for all possible errors surfaced by the crate
#[derive(Debug, Error)]
pub enum NoteError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Menu(#[from] MenuError),
}

// Enum for all possible menu input errors
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Failed to read from stdin: {0}")]
    StdinReadError(io::Error),

    #[error("Couldn't convert '{0}' to a number. Please enter a number 1-8")]
    ParseError(String),

    #[error("Couldn't convert '{0}' to a MenuOption. Please enter a number 1-8")]
    InvalidOption(u8),

    #[error("Failed writing to stdout")]
    StdoutWriteError(io::Error),

    #[error("No note with ID '{0}' in {1}")]
    UnknownNote(String, CollectionId),
}

// Enum for all possible database/backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed opening database")]
    DatabaseCreationError,

    #[error("Failed creating `documents` table in database")]
    TableCreationError,

    #[error("No document '{id}' in collection '{collection}'")]
    DocumentNotFound { collection: String, id: String },

    #[error("Document is not a valid JSON object")]
    DocumentCorrupted(#[source] serde_json::Error),

    #[error("Document already exists")]
    Duplicate,

    #[error("Database is locked or busy")]
    Timeout,

    #[error("Insufficient permissions")]
    PermissionDenied,

    #[error("Database file is not a valid SQLite database")]
    NotADatabase,

    #[error("Database schema has changed unexpectedly")]
    SchemaChanged,

    #[error("Database worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error), // Used as fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(data: Value) -> Document {
        let Value::Object(data) = data else {
            panic!("expected an object");
        };
        Document {
            id: "doc".into(),
            data,
        }
    }

    #[test]
    fn type_tag_decides_the_kind() {
        let kind = |data| Note::from_document(&document(data)).kind;

        assert_eq!(kind(json!({})), NoteKind::Note);
        assert_eq!(kind(json!({"type": ""})), NoteKind::Note);
        assert_eq!(kind(json!({"type": null})), NoteKind::Note);
        assert_eq!(kind(json!({"type": 3})), NoteKind::Note);
        assert_eq!(kind(json!({"type": "note"})), NoteKind::Note);
        assert_eq!(kind(json!({"type": "trash"})), NoteKind::Trash);
        assert_eq!(kind(json!({"type": "archived"})), NoteKind::Trash);
    }

    #[test]
    fn mistyped_fields_fall_back_to_defaults() {
        let note = Note::from_document(&document(json!({
            "title": 5,
            "content": ["not", "text"],
            "marked": "yes",
        })));

        assert_eq!(note.id.as_deref(), Some("doc"));
        assert_eq!(note.title, "");
        assert_eq!(note.content, "");
        assert!(!note.marked);
    }

    #[test]
    fn well_formed_fields_are_kept() {
        let note = Note::from_document(&document(json!({
            "type": "trash",
            "title": "T",
            "content": "C",
            "marked": true,
            "owner": "someone",
        })));

        assert_eq!(
            note,
            Note {
                id: Some("doc".into()),
                kind: NoteKind::Trash,
                title: "T".into(),
                content: "C".into(),
                marked: true,
            }
        );
        assert_eq!(note.collection(), CollectionId::Trash);
    }

    #[test]
    fn fields_hold_exactly_the_four_writable_keys() {
        let mut note = Note::new("T", "C").with_marked(true);
        note.id = Some("doc".into());

        let fields = note.fields();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["type", "title", "content", "marked"] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["type"], json!("note"));
        assert_eq!(fields["marked"], json!(true));
    }
}
