//! Stored Record Contract
//!
//! The shape every backend stores: pure data keyed by a [`Uuid2`],
//! convertible to and from domain and DTO shapes by the repository layer.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::uuid2::{TypeTagged, Uuid2};

/// A record that can be stored in any backend.
///
/// Records carry no business logic. The serde bounds fix the persisted
/// shape: a JSON object whose `id` field is `{"uuid": ..., "type": ...}`
/// plus the record's own fields.
pub trait StoredRecord:
    TypeTagged + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The record's identifier. Uniqueness within a collection is enforced
    /// by this id.
    fn id(&self) -> Uuid2;
}
