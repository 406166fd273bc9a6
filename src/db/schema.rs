//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Uploaded and derived PDF documents
CREATE TABLE IF NOT EXISTS documents (
    key TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    disk_name TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER NOT NULL,
    mime_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);

-- Rendered page images, owned by their parent document
CREATE TABLE IF NOT EXISTS images (
    key TEXT PRIMARY KEY,
    document_key TEXT NOT NULL REFERENCES documents(key) ON DELETE CASCADE,
    name TEXT NOT NULL,
    disk_name TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER NOT NULL,
    mime_type TEXT NOT NULL,
    -- 1-indexed page in the parent document
    page_number INTEGER NOT NULL,
    format TEXT NOT NULL,
    width INTEGER,
    height INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_document_key ON images(document_key);

-- Last truncation run per document
CREATE TABLE IF NOT EXISTS truncation_status (
    document_key TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);

-- Last image conversion run per document
CREATE TABLE IF NOT EXISTS image_status (
    document_key TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);
"#;
