//! Database schema definitions.

/// Schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- Documents table
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    source_uri TEXT NOT NULL,
    content_hash BLOB NOT NULL,
    raw_text TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash);

-- Chunks table
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    sequence_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    offset_start INTEGER NOT NULL,
    offset_end INTEGER NOT NULL,
    page INTEGER,
    token_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);

-- Index entries: embedding vectors keyed by chunk id
CREATE TABLE IF NOT EXISTS entries (
    chunk_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
    document_id TEXT NOT NULL,
    page INTEGER,
    tags TEXT NOT NULL DEFAULT '[]',
    vector BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_document_id ON entries(document_id);

-- Agent session traces, stored whole as JSON (best-effort durability)
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    data TEXT NOT NULL
);
"#;

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;
