#![allow(dead_code)]

use noteboard::backends::{DocumentBackend, MemoryBackend};
use noteboard::{BackendError, Document, Fields, Note, NoteError, NoteList, Query, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Waits until the live list satisfies `done` and returns its contents at that moment
pub async fn wait_for(list: &NoteList, done: impl FnMut(&Vec<Note>) -> bool) -> Vec<Note> {
    let mut receiver = list.subscribe();
    timeout(WAIT, receiver.wait_for(done))
        .await
        .expect("live list did not settle in time")
        .expect("live list sender dropped")
        .clone()
}

pub fn titles(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|note| note.title.as_str()).collect()
}

/// Shared switches and counters for a `FlakyBackend`
#[derive(Debug, Default)]
pub struct Faults {
    pub fail_writes: AtomicBool,
    pub fail_queries: AtomicBool,
    pub writes: AtomicUsize,
    pub failed_queries: AtomicUsize,
}

impl Faults {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Polls until at least `count` queries have failed
    pub async fn wait_for_failed_queries(&self, count: usize) {
        timeout(WAIT, async {
            while self.failed_queries.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queries did not fail in time");
    }
}

/// In-memory backend whose writes and queries can be switched to fail
#[derive(Debug)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    faults: Arc<Faults>,
}

impl FlakyBackend {
    pub fn new() -> (Self, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        (
            Self {
                inner: MemoryBackend::new(),
                faults: Arc::clone(&faults),
            },
            faults,
        )
    }

    fn write(&self) -> Result<()> {
        self.faults.writes.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_writes.load(Ordering::SeqCst) {
            Err(NoteError::Backend(BackendError::PermissionDenied))
        } else {
            Ok(())
        }
    }
}

impl DocumentBackend for FlakyBackend {
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<String> {
        self.write()?;
        self.inner.insert(collection, fields)
    }

    fn update(&mut self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.write()?;
        self.inner.update(collection, id, fields)
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<()> {
        self.write()?;
        self.inner.delete(collection, id)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.inner.get(collection, id)
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>> {
        if self.faults.fail_queries.load(Ordering::SeqCst) {
            self.faults.failed_queries.fetch_add(1, Ordering::SeqCst);
            return Err(NoteError::Backend(BackendError::Timeout));
        }
        self.inner.run_query(query)
    }
}
