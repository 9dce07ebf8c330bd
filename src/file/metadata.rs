//! Metadata store abstraction and the SQLite-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use super::model::{size_mb, FileRecord, NewFileRecord};
use crate::config::is_identifier;
use crate::db::{collection_schema, Database};
use crate::{DriveError, Result};

/// Document store holding one [`FileRecord`] per stored blob.
///
/// Implementations assign ids on insert and must report deleting a missing
/// id as [`DriveError::NotFound`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record and return it with its assigned id.
    async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord>;

    /// All records, most recent `uploaded_at` first; equal timestamps are
    /// ordered by most recent insertion first.
    async fn list_all(&self) -> Result<Vec<FileRecord>>;

    /// Get a record by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>>;

    /// Get the most recent record referencing `storage_path`.
    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Option<FileRecord>>;

    /// Delete a record by id.
    async fn delete_by_id(&self, id: &str) -> Result<()>;
}

/// Row layout of a file record collection.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: String,
    original_name: String,
    stored_name: String,
    size_bytes: i64,
    mime_type: String,
    storage_path: String,
    download_url: String,
    uploaded_at: String,
    file_extension: String,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = DriveError;

    fn try_from(row: FileRow) -> Result<Self> {
        let uploaded_at = DateTime::parse_from_rfc3339(&row.uploaded_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                DriveError::Database(format!(
                    "record {} has malformed uploaded_at {:?}: {e}",
                    row.id, row.uploaded_at
                ))
            })?;
        let size_bytes = u64::try_from(row.size_bytes).map_err(|_| {
            DriveError::Database(format!(
                "record {} has negative size {}",
                row.id, row.size_bytes
            ))
        })?;

        Ok(FileRecord {
            id: row.id,
            original_name: row.original_name,
            stored_name: row.stored_name,
            size_bytes,
            size_mb: size_mb(size_bytes),
            mime_type: row.mime_type,
            storage_path: row.storage_path,
            download_url: row.download_url,
            uploaded_at,
            file_extension: row.file_extension,
        })
    }
}

/// Timestamps are stored with a fixed width so that text order is time order.
fn encode_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const SELECT_COLUMNS: &str = "id, original_name, stored_name, size_bytes, mime_type, \
     storage_path, download_url, uploaded_at, file_extension";

/// Metadata store backed by a SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    db: Database,
    collection: String,
}

impl SqliteMetadataStore {
    /// Open the collection `collection` in `db`, creating it if needed.
    pub async fn open(db: Database, collection: impl Into<String>) -> Result<Self> {
        let collection = collection.into();
        if !is_identifier(&collection) {
            return Err(DriveError::Config(format!(
                "invalid collection name {collection:?}"
            )));
        }

        sqlx::raw_sql(&collection_schema(&collection))
            .execute(db.pool())
            .await?;
        tracing::debug!(collection = %collection, "Metadata collection ready");

        Ok(Self { db, collection })
    }

    /// Open a fresh in-memory collection named `files`.
    pub async fn open_in_memory() -> Result<Self> {
        Self::open(Database::open_in_memory().await?, "files").await
    }

    /// Name of the backing collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Count records in the collection.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.collection))
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    #[tracing::instrument(skip(self, record), fields(storage_path = %record.storage_path))]
    async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord> {
        let size_bytes = i64::try_from(record.size_bytes)
            .map_err(|_| DriveError::Validation(format!("size {} too large", record.size_bytes)))?;
        let record = record
            .clone()
            .into_record(Uuid::new_v4().to_string());

        sqlx::query(&format!(
            "INSERT INTO {} (id, original_name, stored_name, size_bytes, mime_type,
                             storage_path, download_url, uploaded_at, file_extension)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.collection
        ))
        .bind(&record.id)
        .bind(&record.original_name)
        .bind(&record.stored_name)
        .bind(size_bytes)
        .bind(&record.mime_type)
        .bind(&record.storage_path)
        .bind(&record.download_url)
        .bind(encode_timestamp(&record.uploaded_at))
        .bind(&record.file_extension)
        .execute(self.db.pool())
        .await?;

        tracing::debug!(id = %record.id, "Inserted file record");
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM {} ORDER BY uploaded_at DESC, seq DESC",
            self.collection
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter().map(FileRecord::try_from).collect()
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM {} WHERE id = ?",
            self.collection
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn find_by_storage_path(&self, storage_path: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM {} WHERE storage_path = ? ORDER BY seq DESC LIMIT 1",
            self.collection
        ))
        .bind(storage_path)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.collection))
            .bind(id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DriveError::NotFound(format!("file record {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn new_record(name: &str, size: u64, uploaded_at: DateTime<Utc>) -> NewFileRecord {
        let stored_name = format!("{}_{name}", uploaded_at.format("%Y%m%d_%H%M%S"));
        NewFileRecord {
            original_name: name.to_string(),
            storage_path: format!("uploads/{stored_name}"),
            download_url: format!("http://localhost/files/uploads/{stored_name}"),
            stored_name,
            size_bytes: size,
            mime_type: "text/plain".to_string(),
            uploaded_at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();

        let record = store.insert(&new_record("a.TXT", 42, t0())).await.unwrap();

        assert!(!record.id.is_empty());
        assert_eq!(record.original_name, "a.TXT");
        assert_eq!(record.size_bytes, 42);
        assert_eq!(record.file_extension, ".txt");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_by_id_round_trips_fields() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        let uploaded_at = t0() + Duration::microseconds(123_456);

        let created = store
            .insert(&new_record("b.txt", 1_048_576, uploaded_at))
            .await
            .unwrap();
        let found = store.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(found, created);
        assert_eq!(found.size_mb, 1.0);
        assert_eq!(found.uploaded_at, uploaded_at);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        assert!(store.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_orders_by_uploaded_at_desc() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();

        store.insert(&new_record("old.txt", 1, t0())).await.unwrap();
        store
            .insert(&new_record("new.txt", 1, t0() + Duration::seconds(10)))
            .await
            .unwrap();
        store
            .insert(&new_record("mid.txt", 1, t0() + Duration::seconds(5)))
            .await
            .unwrap();

        let names: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.original_name)
            .collect();
        assert_eq!(names, vec!["new.txt", "mid.txt", "old.txt"]);
    }

    #[tokio::test]
    async fn test_list_all_ties_break_by_insertion_order() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();

        store.insert(&new_record("first.txt", 1, t0())).await.unwrap();
        store.insert(&new_record("second.txt", 1, t0())).await.unwrap();

        let names: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.original_name)
            .collect();
        assert_eq!(names, vec!["second.txt", "first.txt"]);
    }

    #[tokio::test]
    async fn test_find_by_storage_path() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        let created = store.insert(&new_record("c.txt", 1, t0())).await.unwrap();

        let found = store
            .find_by_storage_path(&created.storage_path)
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(created.id));

        assert!(store
            .find_by_storage_path("uploads/missing")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let store = SqliteMetadataStore::open_in_memory().await.unwrap();
        let created = store.insert(&new_record("d.txt", 1, t0())).await.unwrap();

        store.delete_by_id(&created.id).await.unwrap();
        assert!(store.get_by_id(&created.id).await.unwrap().is_none());

        let err = store.delete_by_id(&created.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_custom_collection() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteMetadataStore::open(db.clone(), "drive_files")
            .await
            .unwrap();

        assert_eq!(store.collection(), "drive_files");
        assert!(db.table_exists("drive_files").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_invalid_collection() {
        let db = Database::open_in_memory().await.unwrap();
        let result = SqliteMetadataStore::open(db, "files; DROP TABLE x").await;
        assert!(matches!(result, Err(DriveError::Config(_))));
    }

    #[test]
    fn test_encode_timestamp_fixed_width() {
        assert_eq!(encode_timestamp(&t0()), "2024-05-01T12:00:00.000000Z");
    }
}
