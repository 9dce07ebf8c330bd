//! Schema for the file record collection.

/// DDL for a file record collection named `collection`.
///
/// `collection` must already be validated as a plain identifier. `seq`
/// records insertion order and breaks ties between equal `uploaded_at`
/// values; `id` is the opaque identifier handed to callers.
pub fn collection_schema(collection: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {collection} (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    id              TEXT NOT NULL UNIQUE,
    original_name   TEXT NOT NULL,
    stored_name     TEXT NOT NULL,
    size_bytes      INTEGER NOT NULL CHECK (size_bytes >= 0),
    mime_type       TEXT NOT NULL,
    storage_path    TEXT NOT NULL,
    download_url    TEXT NOT NULL,
    uploaded_at     TEXT NOT NULL,  -- RFC 3339, UTC, fixed microsecond precision
    file_extension  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{collection}_uploaded_at ON {collection}(uploaded_at DESC, seq DESC);
CREATE INDEX IF NOT EXISTS idx_{collection}_storage_path ON {collection}(storage_path);
"#
    )
}
