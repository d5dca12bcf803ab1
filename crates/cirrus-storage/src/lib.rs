//! Cirrus Storage Library
//!
//! This crate provides the storage abstraction and implementations for Cirrus.
//! It includes the Storage trait and local-filesystem, in-memory and S3
//! backends.
//!
//! # Locator format
//!
//! Locators are owner-scoped: `files/{owner_id}/{filename}`. Locators must not
//! contain `..` or a leading `/`. Locator generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use cirrus_core::StorageBackend;
pub use factory::create_storage;
pub use keys::file_locator;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
