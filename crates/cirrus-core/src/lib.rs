//! Cirrus Core Library
//!
//! This crate provides core domain models, error types, configuration, and
//! content classification that are shared across all Cirrus components.

pub mod config;
pub mod constants;
pub mod error;
pub mod filename;
pub mod media;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
