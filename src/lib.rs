//! # ShelfDB
//!
//! A backend-agnostic persistent document store with type-tagged identifiers.
//!
//! ## Features
//!
//! - **Type-Tagged Ids**: [`Uuid2`](uuid2::Uuid2) pairs a raw UUID with an
//!   explicit type tag, so a `Book` id and a `User` id never cross wires
//! - **Uniform Contract**: one [`StorageBackend`](store::StorageBackend)
//!   trait over every backend, with identical add/update/upsert/delete
//!   semantics
//! - **Pluggable Persistence**: ephemeral in-memory map, a single JSON
//!   file with a crash-safe rename-swap write protocol, or Redis Stack
//!   with a search index (feature `redis`)
//! - **Explicit Field Search**: collections declare their searchable
//!   fields in a [`FieldMap`](store::FieldMap); no runtime introspection
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use shelfdb::store::{FieldMap, InMemoryBackend, StorageBackend, StoredRecord};
//! use shelfdb::uuid2::{TypeTagged, Uuid2};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Book {
//!     id: Uuid2,
//!     title: String,
//! }
//!
//! impl TypeTagged for Book {
//!     const TYPE_TAG: &'static str = "Model.DomainInfo.BookInfo";
//! }
//!
//! impl StoredRecord for Book {
//!     fn id(&self) -> Uuid2 {
//!         self.id.clone()
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), shelfdb::store::StoreError> {
//! let store = InMemoryBackend::new(
//!     FieldMap::new().with_field("title", |b: &Book| b.title.clone()),
//! );
//!
//! let book = Book {
//!     id: Uuid2::generate::<Book>(),
//!     title: "The Hobbit".to_string(),
//! };
//! store.add(book.clone()).await?;
//!
//! let hits = store.find_by_field("title", "hobbit").await?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Repositories (application layer)             │
//! ├─────────────────────────────────────────────────────────┤
//! │  StorageBackend<R>    │ one async contract, three impls │
//! ├───────────┬───────────┴─────────┬───────────────────────┤
//! │ InMemory  │ FileBackend         │ RedisBackend          │
//! │ (HashMap) │ (JSON + rename-swap)│ (RedisJSON + search)  │
//! ├───────────┴─────────────────────┴───────────────────────┤
//! │  Uuid2  -  UUID2:<type-tag>@<uuid>  key type everywhere │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `redis` - Redis Stack storage backend (JSON + Search modules)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod store;
pub mod uuid2;

// Re-export common types
pub use store::{
    FieldMap, FileBackend, FileBackendConfig, InMemoryBackend, StorageBackend, StoreError,
    StoreResult, StoredRecord,
};
pub use uuid2::{TypeTagged, Uuid2, Uuid2Error};

#[cfg(feature = "redis")]
pub use store::{RedisBackend, RedisConfig};
