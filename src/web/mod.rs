//! Web API module for clouddrive.
//!
//! This module exposes the file manager over a JSON HTTP API and, for the
//! local blob backend, serves the stored blobs themselves.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
