use crate::database::{Database, ListenerRegistration};
use crate::document::{ChangeKind, Filter, Query, QuerySnapshot};
use crate::{CollectionId, Note, NoteKind, Result};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::watch;

/// Maximum number of notes kept in each live list
pub const LIST_LIMIT: usize = 100;

/// A live list of notes. Readers get snapshots or a watch receiver, only the store replaces the contents
#[derive(Debug, Clone)]
pub struct NoteList {
    notes: Arc<watch::Sender<Vec<Note>>>,
}

impl Default for NoteList {
    fn default() -> Self {
        let (notes, _) = watch::channel(Vec::new());
        Self {
            notes: Arc::new(notes),
        }
    }
}

impl NoteList {
    /// Copy of the current contents
    #[must_use]
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.borrow().is_empty()
    }

    /// Receiver that is notified every time the list is rebuilt
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Note>> {
        self.notes.subscribe()
    }

    // Whole-list swap; readers never observe a half-built list
    pub(crate) fn replace(&self, notes: Vec<Note>) {
        self.notes.send_replace(notes);
    }
}

/// Facade over the `notes` and `trash` collections.
///
/// Keeps three live lists in sync with the database and offers write
/// operations that report failures only through the log.
#[derive(Debug)]
pub struct NoteStore {
    db: Database,
    trash_notes: NoteList,
    normal_notes: NoteList,
    normal_marked_notes: NoteList,
    listeners: Vec<ListenerRegistration>,
}

impl NoteStore {
    /// Subscribes the three live lists. Must be called inside a Tokio runtime
    #[must_use]
    pub fn new(db: Database) -> Self {
        let trash_notes = NoteList::default();
        let normal_notes = NoteList::default();
        let normal_marked_notes = NoteList::default();

        let listeners = vec![
            subscribe_list(&db, "trash", trash_query(), &trash_notes),
            subscribe_list(&db, "notes", notes_query(false), &normal_notes),
            subscribe_list(&db, "marked notes", notes_query(true), &normal_marked_notes),
        ];

        Self {
            db,
            trash_notes,
            normal_notes,
            normal_marked_notes,
            listeners,
        }
    }

    /// Trash notes sorted by title
    #[must_use]
    pub const fn trash_notes(&self) -> &NoteList {
        &self.trash_notes
    }

    /// Unmarked notes from the `notes` collection
    #[must_use]
    pub const fn normal_notes(&self) -> &NoteList {
        &self.normal_notes
    }

    /// Marked notes from the `notes` collection
    #[must_use]
    pub const fn normal_marked_notes(&self) -> &NoteList {
        &self.normal_marked_notes
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// Writes `item` as a new document into `target`. The item's id, if any, is not written
    pub async fn add_note(&self, item: &Note, target: CollectionId) {
        match self.db.add(target.as_str(), item.fields()).await {
            Ok(id) => info!("Document {id} successfully added to collection {target}!"),
            Err(e) => error!("Error adding document to collection {target}: {e}"),
        }
    }

    /// Writes back `type`, `title`, `content` and `marked`. Does nothing for notes without an id
    pub async fn update_note(&self, note: &Note) {
        let Some(id) = note.id.as_deref() else {
            debug!("Skipping update of unsaved note '{}'", note.title);
            return;
        };
        let collection = note.collection();
        log_outcome(
            self.db.update(collection.as_str(), id, note.fields()).await,
            "updating document",
            "Document successfully updated!",
        );
    }

    /// Removes document `doc_id` from `collection`
    pub async fn delete_note(&self, collection: CollectionId, doc_id: &str) {
        log_outcome(
            self.db.delete(collection.as_str(), doc_id).await,
            "removing document",
            "Document successfully removed!",
        );
    }

    /// Moves a note into the trash: delete from `notes`, then add to `trash`.
    /// The two steps are not atomic. If the delete fails nothing is added
    pub async fn move_to_trash(&self, note: &Note) {
        self.relocate(note, CollectionId::Notes, NoteKind::Trash)
            .await;
    }

    /// Moves a note back out of the trash: delete from `trash`, then add to `notes`
    pub async fn restore(&self, note: &Note) {
        self.relocate(note, CollectionId::Trash, NoteKind::Note)
            .await;
    }

    /// Stops all three live lists. They keep their last contents
    pub fn teardown(self) {
        for listener in self.listeners {
            listener.remove();
        }
        debug!("Note store torn down");
    }

    async fn relocate(&self, note: &Note, from: CollectionId, kind: NoteKind) {
        let Some(id) = note.id.as_deref() else {
            debug!("Skipping move of unsaved note '{}'", note.title);
            return;
        };

        if let Err(e) = self.db.delete(from.as_str(), id).await {
            error!("Error removing document {id} from {from}: {e}");
            return;
        }
        let moved = note.clone().with_kind(kind);
        self.add_note(&moved, moved.collection()).await;
    }
}

fn trash_query() -> Query {
    Query::collection(CollectionId::Trash.as_str())
        .order_by("title")
        .limit(LIST_LIMIT)
}

fn notes_query(marked: bool) -> Query {
    Query::collection(CollectionId::Notes.as_str())
        .filter(Filter::equals("marked", marked))
        .limit(LIST_LIMIT)
}

fn log_outcome(result: Result<()>, action: &str, success: &str) {
    match result {
        Ok(()) => info!("{success}"),
        Err(e) => error!("Error {action}: {e}"),
    }
}

/// Keeps `list` equal to the latest result set of `query`
fn subscribe_list(
    db: &Database,
    name: &'static str,
    query: Query,
    list: &NoteList,
) -> ListenerRegistration {
    let list = list.clone();
    db.on_snapshot(
        query,
        move |snapshot: QuerySnapshot| {
            list.replace(snapshot.iter().map(Note::from_document).collect());
            log_changes(&snapshot);
        },
        move |e| error!("Live list of {name} stopped: {e}"),
    )
}

fn log_changes(snapshot: &QuerySnapshot) {
    for change in &snapshot.changes {
        let data = serde_json::Value::Object(change.document.data.clone());
        match change.kind {
            ChangeKind::Added => debug!("New note: {data}"),
            ChangeKind::Modified => debug!("Modified note: {data}"),
            ChangeKind::Removed => debug!("Removed note: {data}"),
        }
    }
}
