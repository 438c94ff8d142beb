//! Managed query engine over a [`DocumentBackend`].
//!
//! Writes go through [`Database`], which announces every touched collection
//! on a broadcast channel. Each live query registered with
//! [`Database::on_snapshot`] runs in its own task, re-runs its query when
//! its collection is written and hands the new result set, together with the
//! per-document changes, to the caller's callback.

use crate::backends::DocumentBackend;
use crate::document::{self, Document, Fields, Query, QuerySnapshot};
use crate::{BackendError, NoteError, Result};
use log::{debug, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::{CancellationToken, DropGuard};

// Pending write notifications per listener before it starts lagging
const EVENT_CAPACITY: usize = 256;

struct Shared {
    backend: Mutex<Box<dyn DocumentBackend>>,
    writes: broadcast::Sender<String>,
}

/// Cloneable handle to a document database
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("listeners", &self.shared.writes.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Database {
    #[must_use]
    pub fn new(backend: impl DocumentBackend + 'static) -> Self {
        let (writes, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                backend: Mutex::new(Box::new(backend)),
                writes,
            }),
        }
    }

    /// Adds a document to `collection` and returns the ID the backend assigned
    ///
    /// # Errors
    ///
    /// Forwards any backend error
    pub async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let name = collection.to_string();
        let id = self
            .with_backend(move |backend| backend.insert(&name, fields))
            .await?;
        self.announce(collection);
        Ok(id)
    }

    /// Merges `fields` into an existing document
    ///
    /// # Errors
    ///
    /// `BackendError::DocumentNotFound` if the document does not exist, otherwise any backend error
    pub async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let (name, id) = (collection.to_string(), id.to_string());
        self.with_backend(move |backend| backend.update(&name, &id, fields))
            .await?;
        self.announce(collection);
        Ok(())
    }

    /// Deletes a document. Deleting a missing document succeeds
    ///
    /// # Errors
    ///
    /// Forwards any backend error
    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let (name, id) = (collection.to_string(), id.to_string());
        self.with_backend(move |backend| backend.delete(&name, &id))
            .await?;
        self.announce(collection);
        Ok(())
    }

    /// Reads a single document
    ///
    /// # Errors
    ///
    /// Forwards any backend error
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let (name, id) = (collection.to_string(), id.to_string());
        self.with_backend(move |backend| backend.get(&name, &id))
            .await
    }

    /// One-off evaluation of a query
    ///
    /// # Errors
    ///
    /// Forwards any backend error
    pub async fn query(&self, query: Query) -> Result<Vec<Document>> {
        self.with_backend(move |backend| backend.run_query(&query))
            .await
    }

    /// Starts a live query.
    ///
    /// `on_next` receives the initial result set right away and then a new
    /// snapshot every time the result set changes. If the query fails,
    /// `on_error` is called once and the listener stops for good.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime
    pub fn on_snapshot<N, E>(&self, query: Query, on_next: N, on_error: E) -> ListenerRegistration
    where
        N: FnMut(QuerySnapshot) + Send + 'static,
        E: FnOnce(NoteError) + Send + 'static,
    {
        let token = CancellationToken::new();
        // Subscribe before the first read so no write between the two goes unnoticed
        let writes = self.shared.writes.subscribe();
        let listener = Listener {
            database: self.clone(),
            query,
            writes,
            cancelled: token.clone(),
        };
        tokio::spawn(listener.run(on_next, on_error));

        ListenerRegistration {
            _guard: token.drop_guard(),
        }
    }

    fn announce(&self, collection: &str) {
        // No receivers just means nobody is listening
        let _ = self.shared.writes.send(collection.to_string());
    }

    async fn with_backend<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DocumentBackend) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let mut backend = shared.backend.lock();
            f(&mut **backend)
        })
        .await
        .map_err(|e| NoteError::Backend(BackendError::Worker(e.to_string())))?
    }
}

/// Keeps a live query running. Removing or dropping it stops all further callbacks
#[derive(Debug)]
#[must_use = "dropping a ListenerRegistration stops the listener immediately"]
pub struct ListenerRegistration {
    _guard: DropGuard,
}

impl ListenerRegistration {
    /// Cancels the live query
    pub fn remove(self) {
        drop(self);
    }
}

struct Listener {
    database: Database,
    query: Query,
    writes: broadcast::Receiver<String>,
    cancelled: CancellationToken,
}

impl Listener {
    async fn run<N, E>(mut self, mut on_next: N, on_error: E)
    where
        N: FnMut(QuerySnapshot),
        E: FnOnce(NoteError),
    {
        debug!("Listening to `{}`", self.query);
        let mut previous: Option<Vec<Document>> = None;

        loop {
            let result = tokio::select! {
                () = self.cancelled.cancelled() => break,
                result = self.database.query(self.query.clone()) => result,
            };
            if self.cancelled.is_cancelled() {
                break;
            }

            match result {
                Ok(documents) => {
                    let changes = document::diff(previous.as_deref().unwrap_or_default(), &documents);
                    if previous.is_none() || !changes.is_empty() {
                        trace!("`{}` delivered {} change(s)", self.query, changes.len());
                        on_next(QuerySnapshot {
                            documents: documents.clone(),
                            changes,
                        });
                    }
                    previous = Some(documents);
                }
                Err(e) => {
                    warn!("Live query `{}` failed, stopping listener", self.query);
                    on_error(e);
                    return;
                }
            }

            if !self.wait_for_write().await {
                break;
            }
        }
        debug!("Stopped listening to `{}`", self.query);
    }

    /// Waits until the query's collection is written. Returns `false` once the listener should stop
    async fn wait_for_write(&mut self) -> bool {
        loop {
            tokio::select! {
                () = self.cancelled.cancelled() => return false,
                event = self.writes.recv() => match event {
                    Ok(collection) if collection == self.query.collection => return true,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("`{}` missed {skipped} write notification(s), re-running", self.query);
                        return true;
                    }
                    Err(RecvError::Closed) => return false,
                },
            }
        }
    }
}
