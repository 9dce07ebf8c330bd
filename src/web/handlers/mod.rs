//! API handlers.

pub mod file;

pub use file::*;

use std::sync::Arc;

use crate::file::FileManager;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// File manager coordinating both stores.
    pub manager: Arc<FileManager>,
    /// Maximum upload size in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Create a new AppState.
    pub fn new(manager: Arc<FileManager>) -> Self {
        let max_upload_size = manager.config().max_file_size_bytes;
        Self {
            manager,
            max_upload_size,
        }
    }
}
