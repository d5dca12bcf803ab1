//! Cirrus Metadata Store Library
//!
//! This crate provides the `MetadataStore` capability interface over the
//! document store for File and Thumbnail records, with a Postgres
//! implementation (runtime sqlx queries, migrations in `migrations/`) and an
//! in-memory implementation used by tests and deployments without a
//! `DATABASE_URL`.

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryMetadataStore;
pub use postgres::PgMetadataStore;
pub use store::MetadataStore;
