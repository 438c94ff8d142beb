use super::{
    BackendError, Document, DocumentBackend, Fields, NoteError, Query, Result, new_document_id,
    not_found,
};
use log::{debug, trace};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Error as SqliteError, ErrorCode, OptionalExtension, params, params_from_iter};
use serde_json::Value;

#[derive(Debug)]
pub struct SqliteBackend {
    connection: Connection,
}

impl SqliteBackend {
    /// Creates a new `SqliteBackend` by opening the `SQLite` database at the given path.
    /// Also ensures that the `documents` table exists.
    ///
    /// # Errors
    ///
    /// `BackendError::DatabaseCreationError` if the database file cannot be opened
    /// `BackendError::TableCreationError` if the `documents` table cannot be created.
    pub fn open(path: &str) -> Result<Self> {
        let connection = Connection::open(path)
            .map_err(|_| NoteError::Backend(BackendError::DatabaseCreationError))?;
        debug!("Opened connection to db: {path}");
        Self::init(connection)
    }

    /// Same as [`SqliteBackend::open`] but the database only lives as long as the backend
    ///
    /// # Errors
    ///
    /// See [`SqliteBackend::open`]
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()
            .map_err(|_| NoteError::Backend(BackendError::DatabaseCreationError))?;
        debug!("Opened in-memory db");
        Self::init(connection)
    }

    fn init(connection: Connection) -> Result<Self> {
        // One table for all collections, every document stored as a JSON object
        connection
            .execute(
                "
                CREATE TABLE IF NOT EXISTS documents (
                    collection TEXT NOT NULL,
                    id         TEXT NOT NULL,
                    data       TEXT NOT NULL,
                    PRIMARY KEY (collection, id)
                )
                ",
                [],
            )
            .map_err(|_e| NoteError::Backend(BackendError::TableCreationError))?;
        debug!("Initialized db with `documents` table");
        Ok(Self { connection })
    }
}

/// Maps a `rusqlite::Error` into a `NoteError`, wrapping known SQLite-specific codes into domain-specific variants.
///
/// # Errors
///
/// Always returns a `NoteError::Backend` variant. Specific known `SQLite` error codes
/// are converted to more descriptive errors; all others are wrapped in `BackendError::Other`.
fn map_sqlite_error(e: SqliteError) -> NoteError {
    match e {
        SqliteError::SqliteFailure(code, _) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                NoteError::Backend(BackendError::Timeout)
            }
            ErrorCode::PermissionDenied => NoteError::Backend(BackendError::PermissionDenied),
            ErrorCode::NotADatabase => NoteError::Backend(BackendError::NotADatabase),
            ErrorCode::SchemaChanged => NoteError::Backend(BackendError::SchemaChanged),
            ErrorCode::ConstraintViolation => NoteError::Backend(BackendError::Duplicate),
            _ => NoteError::Backend(BackendError::Other(anyhow::anyhow!(
                "SQLite error: {:?}",
                code
            ))),
        },
        other => NoteError::Backend(BackendError::Other(anyhow::Error::new(other))),
    }
}

fn encode(fields: &Fields) -> Result<String> {
    serde_json::to_string(fields).map_err(|e| NoteError::Backend(BackendError::DocumentCorrupted(e)))
}

fn decode(id: String, data: &str) -> Result<Document> {
    let fields = serde_json::from_str::<Fields>(data)
        .map_err(|e| NoteError::Backend(BackendError::DocumentCorrupted(e)))?;
    Ok(Document::new(id, fields))
}

// JSON path of a top level field, e.g. `$."title"`
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

/// Builds the `SELECT` for a query together with its positional parameters
fn build_select(query: &Query) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
    let mut params = vec![SqlValue::Text(query.collection.clone())];

    for filter in &query.filters {
        let path = SqlValue::Text(json_path(&filter.field));
        match &filter.value {
            Value::Null => {
                sql.push_str(" AND json_type(data, ?) = 'null'");
                params.push(path);
            }
            Value::Bool(b) => {
                sql.push_str(" AND json_type(data, ?) = ?");
                params.push(path);
                params.push(SqlValue::Text(b.to_string()));
            }
            Value::Number(n) => {
                sql.push_str(
                    " AND json_type(data, ?) IN ('integer', 'real') AND json_extract(data, ?) = ?",
                );
                params.push(path.clone());
                params.push(path);
                params.push(n.as_i64().map_or_else(
                    || SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
                    SqlValue::Integer,
                ));
            }
            Value::String(s) => {
                sql.push_str(" AND json_type(data, ?) = 'text' AND json_extract(data, ?) = ?");
                params.push(path.clone());
                params.push(path);
                params.push(SqlValue::Text(s.clone()));
            }
            nested => {
                let kind = if nested.is_array() { "array" } else { "object" };
                sql.push_str(" AND json_type(data, ?) = ? AND json_extract(data, ?) = json(?)");
                params.push(path.clone());
                params.push(SqlValue::Text(kind.to_string()));
                params.push(path);
                params.push(SqlValue::Text(nested.to_string()));
            }
        }
    }

    if let Some(field) = &query.order_by {
        let path = SqlValue::Text(json_path(field));
        // Rank by JSON type first so values order null < bool < number < string < array < object
        sql.push_str(
            " AND json_type(data, ?) IS NOT NULL ORDER BY \
             CASE json_type(data, ?) \
             WHEN 'null' THEN 0 WHEN 'true' THEN 1 WHEN 'false' THEN 1 \
             WHEN 'integer' THEN 2 WHEN 'real' THEN 2 WHEN 'text' THEN 3 \
             WHEN 'array' THEN 4 ELSE 5 END, \
             json_extract(data, ?), id",
        );
        params.push(path.clone());
        params.push(path.clone());
        params.push(path);
    } else {
        sql.push_str(" ORDER BY id");
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    (sql, params)
}

impl DocumentBackend for SqliteBackend {
    /// Inserts a new document under a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::Duplicate` if the generated ID is already taken.
    /// - `BackendError::Timeout`, `PermissionDenied`, `NotADatabase`, or other mapped SQLite-specific errors.
    fn insert(&mut self, collection: &str, fields: Fields) -> Result<String> {
        let id = new_document_id();
        self.connection
            .execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
                params![collection, id, encode(&fields)?],
            )
            .map_err(map_sqlite_error)?;
        trace!("Inserted {collection}/{id}");
        Ok(id)
    }

    /// Merges `fields` into the stored document. A `null` value is stored, not treated as a removal.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::DocumentNotFound` if no document with the given ID exists.
    /// - Other backend errors if the update fails due to `SQLite` issues.
    fn update(&mut self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut document = self
            .get(collection, id)?
            .ok_or_else(|| not_found(collection, id))?;
        document.data.extend(fields);

        let rows = self
            .connection
            .execute(
                "UPDATE documents SET data = ?3 WHERE collection = ?1 AND id = ?2",
                params![collection, id, encode(&document.data)?],
            )
            .map_err(map_sqlite_error)?;

        if rows == 0 {
            Err(not_found(collection, id))
        } else {
            trace!("Updated {collection}/{id}");
            Ok(())
        }
    }

    /// Deletes a document. Missing documents are ignored.
    ///
    /// # Errors
    ///
    /// Returns a mapped backend error if the deletion fails.
    fn delete(&mut self, collection: &str, id: &str) -> Result<()> {
        let rows = self
            .connection
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .map_err(map_sqlite_error)?;
        trace!("Deleted {rows} row(s) for {collection}/{id}");
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let data: Option<String> = self
            .connection
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_error)?;

        data.map(|data| decode(id.to_string(), &data)).transpose()
    }

    /// Runs `query` inside `SQLite`, filtering and sorting with its JSON functions.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `BackendError::DocumentCorrupted` if a stored row is not a JSON object.
    /// - A mapped backend error if the query fails.
    fn run_query(&self, query: &Query) -> Result<Vec<Document>> {
        let (sql, values) = build_select(query);
        trace!("Running query `{query}` as: {sql}");

        let mut stmt = self.connection.prepare(&sql).map_err(map_sqlite_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(map_sqlite_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(map_sqlite_error)?;

        rows.into_iter().map(|(id, data)| decode(id, &data)).collect()
    }
}
