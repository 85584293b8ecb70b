//! Store - Backend Trait and Implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  StorageBackend<R> Trait                    │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                    ↑                    ↑
//!          │                    │                    │
//! ┌────────┴────────┐  ┌────────┴────────┐  ┌───────┴────────┐
//! │ InMemoryBackend │  │   FileBackend   │  │  RedisBackend  │
//! │   (ephemeral)   │  │   (JSON file)   │  │ (Redis Stack)  │
//! └─────────────────┘  └─────────────────┘  └────────────────┘
//! ```
//!
//! All three backends implement the same contract over any
//! [`StoredRecord`] type, so repositories swap persistence without
//! touching call sites. Records are keyed by [`Uuid2`](crate::uuid2::Uuid2)
//! and field search goes through an explicit [`FieldMap`] declared per
//! collection.

mod backend;
mod error;
mod file;
mod memory;
mod record;

#[cfg(feature = "redis")]
mod redis;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{FieldAccessor, FieldMap, StorageBackend};
pub use error::{StoreError, StoreResult};
pub use file::{FileBackend, FileBackendConfig, LookupRefreshFn};
pub use memory::InMemoryBackend;
pub use record::StoredRecord;

#[cfg(feature = "redis")]
pub use redis::{RedisBackend, RedisConfig};
