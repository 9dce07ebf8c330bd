//! clouddrive - a small cloud drive
//!
//! Uploads land in a blob store while their descriptive metadata lives in a
//! separate metadata store. [`FileManager`] keeps the two consistent across
//! uploads and deletes without a shared transaction.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use error::{DeleteError, DownloadError, DriveError, ListError, Result, UploadError};
pub use file::{
    BlobStore, FileManager, FileRecord, HttpBlobStore, IntentJournal, LocalBlobStore,
    ManagerConfig, MemoryBlobStore, MemoryMetadataStore, MetadataStore, NamingPolicy,
    RecoveryReport, SqliteMetadataStore, StorageStats,
};
pub use web::WebServer;
