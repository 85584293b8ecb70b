//! Storage Backend Trait
//!
//! The abstract operation set every backend must satisfy. All operations
//! are async and return explicit errors; backends serialize their own
//! conflicting internal writes so the trait is safe to call concurrently.

use async_trait::async_trait;

use super::error::StoreResult;
use super::record::StoredRecord;
use crate::uuid2::Uuid2;

// =============================================================================
// Field Accessors
// =============================================================================

/// Extracts the string form of one named field from a record.
pub type FieldAccessor<R> = fn(&R) -> String;

/// Statically declared mapping from field name to accessor function.
///
/// Supplied by each repository at backend construction; this replaces any
/// runtime field introspection for `find_by_field`, and its names double
/// as the indexed field set for search-capable backends.
///
/// # Example
///
/// ```
/// use shelfdb::store::FieldMap;
///
/// struct Book { title: String, author: String }
///
/// let fields: FieldMap<Book> = FieldMap::new()
///     .with_field("title", |b: &Book| b.title.clone())
///     .with_field("author", |b: &Book| b.author.clone());
/// assert!(fields.accessor("title").is_some());
/// assert!(fields.accessor("isbn").is_none());
/// ```
pub struct FieldMap<R> {
    fields: Vec<(&'static str, FieldAccessor<R>)>,
}

impl<R> FieldMap<R> {
    /// Create an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare one searchable field.
    #[must_use]
    pub fn with_field(mut self, name: &'static str, accessor: FieldAccessor<R>) -> Self {
        self.fields.push((name, accessor));
        self
    }

    /// Look up the accessor for a field name.
    #[must_use]
    pub fn accessor(&self, name: &str) -> Option<FieldAccessor<R>> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, accessor)| *accessor)
    }

    /// The declared field names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(name, _)| *name)
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<R> Default for FieldMap<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for FieldMap<R> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<R> std::fmt::Debug for FieldMap<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMap")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Case-insensitive substring match used by the map-based backends.
pub(crate) fn field_contains(value: &str, term: &str) -> bool {
    value.to_lowercase().contains(&term.to_lowercase())
}

/// Reject oversized search terms before they reach any backend.
pub(crate) fn validate_term(term: &str) -> StoreResult<()> {
    if term.len() > crate::constants::SEARCH_TERM_BYTES_MAX {
        return Err(super::error::StoreError::malformed(format!(
            "search term exceeds {} bytes",
            crate::constants::SEARCH_TERM_BYTES_MAX
        )));
    }
    Ok(())
}

// =============================================================================
// StorageBackend
// =============================================================================

/// Abstract storage backend for records.
///
/// Implemented interchangeably by [`InMemoryBackend`](super::InMemoryBackend),
/// [`FileBackend`](super::FileBackend) and the feature-gated `RedisBackend`.
/// Semantics are uniform:
///
/// - `add` fails with `AlreadyExists` when the id is present.
/// - `update` fails with `NotFound` when the id is absent.
/// - `upsert` never fails on existence.
/// - Deletes report whether the record existed; absence is not an error.
#[async_trait]
pub trait StorageBackend<R: StoredRecord>: Send + Sync {
    /// All records in the collection.
    async fn find_all(&self) -> StoreResult<Vec<R>>;

    /// The record with the given id, or `NotFound`.
    async fn find_by_id(&self, id: &Uuid2) -> StoreResult<R>;

    /// Records whose named field's string form contains `term`,
    /// case-insensitively. Unknown field names fail with `Malformed`.
    async fn find_by_field(&self, field: &str, term: &str) -> StoreResult<Vec<R>>;

    /// Store a new record. Fails with `AlreadyExists` if the id is present.
    async fn add(&self, record: R) -> StoreResult<R>;

    /// Replace an existing record. Fails with `NotFound` if the id is absent.
    async fn update(&self, record: R) -> StoreResult<R>;

    /// Add-or-update; never fails on existence.
    async fn upsert(&self, record: R) -> StoreResult<R>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, record: &R) -> StoreResult<bool>;

    /// Remove the record with the given id. Returns whether it existed.
    async fn delete_by_id(&self, id: &Uuid2) -> StoreResult<bool>;

    /// Clear the entire collection and any secondary index.
    async fn delete_all(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Book {
        title: String,
        author: String,
    }

    fn book_fields() -> FieldMap<Book> {
        FieldMap::new()
            .with_field("title", |b: &Book| b.title.clone())
            .with_field("author", |b: &Book| b.author.clone())
    }

    #[test]
    fn test_field_map_lookup() {
        let fields = book_fields();
        assert_eq!(fields.len(), 2);

        let book = Book {
            title: "The Hobbit".to_string(),
            author: "J.R.R. Tolkien".to_string(),
        };
        let accessor = fields.accessor("title").unwrap();
        assert_eq!(accessor(&book), "The Hobbit");
        assert!(fields.accessor("isbn").is_none());
    }

    #[test]
    fn test_field_map_names_in_declaration_order() {
        let fields = book_fields();
        let names: Vec<_> = fields.names().collect();
        assert_eq!(names, vec!["title", "author"]);
    }

    #[test]
    fn test_field_contains_case_insensitive() {
        assert!(field_contains("The Hobbit", "hobbit"));
        assert!(field_contains("The Hobbit", "HOBBIT"));
        assert!(field_contains("The Hobbit", ""));
        assert!(!field_contains("The Hobbit", "silmarillion"));
    }
}
