//! SQLite-backed persistence.
//!
//! Documents, chunks, and index entries survive restart; the in-memory
//! vector index is rebuilt from `entries` on startup. Session traces are
//! saved best-effort after termination. All multi-row writes run inside a
//! transaction so readers never observe a partial document.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use ulid::Ulid;

use docmind_core::{
    AgentSession, Chunk, ChunkSource, DocmindError, Document, EntryMetadata, IndexEntry, Result,
    SessionSink, Stats,
};

use crate::schema::{SCHEMA, SCHEMA_VERSION};

/// SQLite-backed store.
///
/// The connection sits behind a blocking Mutex; individual operations are
/// short, so callers lock per call.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| DocmindError::store(format!("Failed to open database: {}", e)))?;

        info!("Database opened at {:?}", path);
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocmindError::store(format!("Failed to open in-memory database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )
        .map_err(|e| DocmindError::store(format!("Failed to configure connection: {}", e)))?;

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| DocmindError::store(format!("Failed to read schema version: {}", e)))?;
        match version {
            0 => {
                conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                    .map_err(|e| {
                        DocmindError::store(format!("Failed to set schema version: {}", e))
                    })?;
            }
            v if v == SCHEMA_VERSION => {}
            v => {
                return Err(DocmindError::store(format!(
                    "unsupported schema version {} (expected {})",
                    v, SCHEMA_VERSION
                )));
            }
        }

        conn.execute_batch(SCHEMA)
            .map_err(|e| DocmindError::store(format!("Failed to initialize schema: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Persist a document with its chunks and index entries atomically.
    pub fn persist_document(
        &self,
        document: &Document,
        chunks: &[Chunk],
        entries: &[IndexEntry],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| DocmindError::store(e.to_string()))?;

        tx.execute(
            "INSERT INTO documents (id, source_uri, content_hash, raw_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.id.to_string(),
                document.source_uri,
                document.content_hash.as_slice(),
                document.raw_text,
                document.created_at,
            ],
        )
        .map_err(|e| DocmindError::store(e.to_string()))?;

        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks
                 (id, document_id, sequence_index, text, offset_start, offset_end, page, token_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    chunk.id.to_string(),
                    chunk.document_id.to_string(),
                    chunk.sequence_index,
                    chunk.text,
                    chunk.offset_start as i64,
                    chunk.offset_end as i64,
                    chunk.page,
                    chunk.token_count,
                ],
            )
            .map_err(|e| DocmindError::store(e.to_string()))?;
        }

        for entry in entries {
            tx.execute(
                "INSERT OR REPLACE INTO entries (chunk_id, document_id, page, tags, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.chunk_id.to_string(),
                    entry.metadata.document_id.to_string(),
                    entry.metadata.page,
                    serde_json::to_string(&entry.metadata.tags)?,
                    vector_to_blob(&entry.vector),
                ],
            )
            .map_err(|e| DocmindError::store(e.to_string()))?;
        }

        tx.commit().map_err(|e| DocmindError::store(e.to_string()))?;

        debug!(document_id = %document.id, chunks = chunks.len(), "persisted document");
        Ok(())
    }

    /// Look up a document by its content hash, for idempotent ingestion.
    pub fn find_document_by_hash(&self, content_hash: &[u8; 32]) -> Result<Option<Document>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, source_uri, content_hash, raw_text, created_at
             FROM documents WHERE content_hash = ?1 LIMIT 1",
            params![content_hash.as_slice()],
            row_to_document,
        )
        .optional()
        .map_err(|e| DocmindError::store(e.to_string()))
    }

    pub fn get_document(&self, id: Ulid) -> Result<Option<Document>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, source_uri, content_hash, raw_text, created_at
             FROM documents WHERE id = ?1",
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(|e| DocmindError::store(e.to_string()))
    }

    pub fn get_chunk(&self, id: Ulid) -> Result<Option<Chunk>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, document_id, sequence_index, text, offset_start, offset_end, page, token_count
             FROM chunks WHERE id = ?1",
            params![id.to_string()],
            row_to_chunk,
        )
        .optional()
        .map_err(|e| DocmindError::store(e.to_string()))
    }

    /// All chunks of a document, ordered by sequence index.
    pub fn chunks_for_document(&self, document_id: Ulid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, document_id, sequence_index, text, offset_start, offset_end, page, token_count
                 FROM chunks WHERE document_id = ?1 ORDER BY sequence_index",
            )
            .map_err(|e| DocmindError::store(e.to_string()))?;

        let rows = stmt
            .query_map(params![document_id.to_string()], row_to_chunk)
            .map_err(|e| DocmindError::store(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DocmindError::store(e.to_string()))
    }

    /// Delete a document, cascading to its chunks and entries. Returns the
    /// number of chunks removed.
    pub fn delete_document(&self, document_id: Ulid) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| DocmindError::store(e.to_string()))?;

        let chunks = tx
            .execute(
                "DELETE FROM chunks WHERE document_id = ?1",
                params![document_id.to_string()],
            )
            .map_err(|e| DocmindError::store(e.to_string()))?;
        tx.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![document_id.to_string()],
        )
        .map_err(|e| DocmindError::store(e.to_string()))?;

        tx.commit().map_err(|e| DocmindError::store(e.to_string()))?;

        debug!(%document_id, chunks, "deleted document");
        Ok(chunks)
    }

    /// Load every index entry, for rebuilding the in-memory index on
    /// startup.
    pub fn load_entries(&self) -> Result<Vec<IndexEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT chunk_id, document_id, page, tags, vector FROM entries")
            .map_err(|e| DocmindError::store(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let chunk_id: String = row.get(0)?;
                let document_id: String = row.get(1)?;
                let page: Option<u32> = row.get(2)?;
                let tags: String = row.get(3)?;
                let vector: Vec<u8> = row.get(4)?;
                Ok((chunk_id, document_id, page, tags, vector))
            })
            .map_err(|e| DocmindError::store(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let (chunk_id, document_id, page, tags, vector) =
                row.map_err(|e| DocmindError::store(e.to_string()))?;
            entries.push(IndexEntry {
                chunk_id: parse_ulid(&chunk_id)?,
                vector: blob_to_vector(&vector),
                metadata: EntryMetadata {
                    document_id: parse_ulid(&document_id)?,
                    page,
                    tags: serde_json::from_str(&tags)?,
                },
            });
        }

        debug!(count = entries.len(), "loaded index entries");
        Ok(entries)
    }

    /// Persist a terminated session trace (best-effort).
    pub fn persist_session(&self, session: &AgentSession) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO sessions (id, status, created_at, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                serde_json::to_string(&session.status)?,
                session.created_at,
                serde_json::to_string(session)?,
            ],
        )
        .map_err(|e| DocmindError::store(e.to_string()))?;
        Ok(())
    }

    pub fn get_session(&self, id: Ulid) -> Result<Option<AgentSession>> {
        let conn = self.conn.lock().unwrap();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DocmindError::store(e.to_string()))?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Knowledge-base counts. The caller supplies the index dimension.
    pub fn stats(&self, dimension: usize) -> Result<Stats> {
        let conn = self.conn.lock().unwrap();
        let count = |sql: &str| -> Result<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| DocmindError::store(e.to_string()))
        };

        Ok(Stats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            chunks: count("SELECT COUNT(*) FROM chunks")?,
            entries: count("SELECT COUNT(*) FROM entries")?,
            dimension,
        })
    }
}

#[async_trait]
impl ChunkSource for SqliteStore {
    async fn chunk(&self, id: Ulid) -> Result<Option<Chunk>> {
        self.get_chunk(id)
    }
}

#[async_trait]
impl SessionSink for SqliteStore {
    async fn save_session(&self, session: &AgentSession) -> Result<()> {
        self.persist_session(session)
    }
}

fn parse_ulid(s: &str) -> Result<Ulid> {
    Ulid::from_string(s).map_err(|e| DocmindError::store(format!("bad ulid {:?}: {}", s, e)))
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

// Corrupt rows fail the query rather than decay into default values.
fn column_ulid(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<Ulid> {
    let raw: String = row.get(index)?;
    Ulid::from_string(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("bad ulid {:?}: {}", raw, e).into(),
        )
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let hash: Vec<u8> = row.get(2)?;
    let content_hash: [u8; 32] = hash.try_into().map_err(|raw: Vec<u8>| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Blob,
            format!("content hash must be 32 bytes, got {}", raw.len()).into(),
        )
    })?;
    Ok(Document {
        id: column_ulid(row, 0)?,
        source_uri: row.get(1)?,
        content_hash,
        raw_text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: column_ulid(row, 0)?,
        document_id: column_ulid(row, 1)?,
        sequence_index: row.get(2)?,
        text: row.get(3)?,
        offset_start: row.get::<_, i64>(4)? as usize,
        offset_end: row.get::<_, i64>(5)? as usize,
        page: row.get(6)?,
        token_count: row.get(7)?,
        embedding: None,
    })
}
