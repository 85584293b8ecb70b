//! `RedisBackend` - Redis JSON Persistence with Search
//!
//! Stores each record as one RedisJSON document and serves field searches
//! through a RediSearch index over the collection's key namespace.
//!
//! # Key layout
//!
//! ```text
//! <root>:UUID2:<type-tag>@<uuid>   one JSON document per record
//! <root>_index                     RediSearch index over `<root>:*`
//! ```
//!
//! The index is created once at startup, under a process-wide lock. Losing
//! the creation race against another process is expected and downgraded to
//! a warning. Requires a Redis deployment with the JSON and Search modules
//! (Redis Stack).

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::backend::{validate_term, FieldMap, StorageBackend};
use super::error::{StoreError, StoreResult};
use super::record::StoredRecord;
use crate::constants::{
    REDIS_SCAN_PAGE_COUNT, REDIS_SEARCH_INDEX_SUFFIX, REDIS_SEARCH_RESULTS_COUNT_MAX,
};
use crate::uuid2::Uuid2;

/// Characters with query syntax meaning in search terms.
const SEARCH_SPECIAL_CHARS: &str = ",.<>{}[]\"':;!@#$%^&*()-+=~";

/// Serializes search-index creation across backends in this process.
static INDEX_LOCK: Mutex<()> = Mutex::const_new(());

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`RedisBackend`].
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:6379`.
    pub url: String,
    /// Namespace root; prefixes every key and names the search index.
    pub root_name: String,
}

impl RedisConfig {
    /// Configuration for one named collection.
    #[must_use]
    pub fn new(url: impl Into<String>, root_name: impl Into<String>) -> Self {
        let root_name = root_name.into();
        assert!(!root_name.is_empty(), "root name must not be empty");
        Self {
            url: url.into(),
            root_name,
        }
    }
}

// =============================================================================
// RedisBackend
// =============================================================================

/// Redis-persisted storage backend.
///
/// Cheap to clone (clones share the multiplexed connection).
#[derive(Clone)]
pub struct RedisBackend<R: StoredRecord> {
    config: RedisConfig,
    index_name: String,
    conn: MultiplexedConnection,
    fields: Arc<FieldMap<R>>,
}

impl<R: StoredRecord> std::fmt::Debug for RedisBackend<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("root_name", &self.config.root_name)
            .field("index_name", &self.index_name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<R: StoredRecord> RedisBackend<R> {
    /// Connect and ensure the search index exists.
    #[instrument(skip(config, fields), fields(root = %config.root_name))]
    pub async fn connect(config: RedisConfig, fields: FieldMap<R>) -> StoreResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StoreError::connection(format!("open {}: {e}", config.url)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::connection(format!("connect {}: {e}", config.url)))?;

        let index_name = format!("{}{REDIS_SEARCH_INDEX_SUFFIX}", config.root_name);
        let backend = Self {
            config,
            index_name,
            conn,
            fields: Arc::new(fields),
        };
        backend.ensure_index().await?;

        Ok(backend)
    }

    /// Name of the search index.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn record_key(&self, id: &Uuid2) -> String {
        format!("{}:{id}", self.config.root_name)
    }

    /// Create the search index if it is not already present.
    ///
    /// Indexes `$.id.uuid` as a TAG field plus every non-id declared field
    /// as suffix-trie TEXT, so `*term*` wildcard queries match substrings.
    async fn ensure_index(&self) -> StoreResult<()> {
        let _guard = INDEX_LOCK.lock().await;
        let mut conn = self.conn.clone();

        // Single-character wildcard prefixes need MINPREFIX 1. This is a
        // runtime server setting that resets on server restart while the
        // index itself persists, so it is applied on every construction.
        let minprefix: Result<(), redis::RedisError> = redis::cmd("FT.CONFIG")
            .arg("SET")
            .arg("MINPREFIX")
            .arg("1")
            .query_async(&mut conn)
            .await;
        if let Err(e) = minprefix {
            warn!(error = %e, "could not set search MINPREFIX");
        }

        let probe: Result<Value, redis::RedisError> = redis::cmd("FT.INFO")
            .arg(&self.index_name)
            .query_async(&mut conn)
            .await;
        if probe.is_ok() {
            debug!(index = %self.index_name, "search index already exists");
            return Ok(());
        }

        let mut create = redis::cmd("FT.CREATE");
        create
            .arg(&self.index_name)
            .arg("ON")
            .arg("JSON")
            .arg("PREFIX")
            .arg(1)
            .arg(format!("{}:", self.config.root_name))
            .arg("SCHEMA")
            .arg("$.id.uuid")
            .arg("AS")
            .arg("id")
            .arg("TAG");
        for name in self.fields.names() {
            if name == "id" {
                continue;
            }
            create
                .arg(format!("$.{name}"))
                .arg("AS")
                .arg(name)
                .arg("TEXT")
                .arg("WITHSUFFIXTRIE")
                .arg("SORTABLE");
        }

        let created: Result<(), redis::RedisError> = create.query_async(&mut conn).await;
        match created {
            Ok(()) => {
                debug!(index = %self.index_name, "created search index");
                Ok(())
            }
            Err(e) if e.to_string().to_lowercase().contains("already exists") => {
                // Lost the creation race against another process.
                warn!(index = %self.index_name, "search index was created concurrently");
                Ok(())
            }
            Err(e) => Err(StoreError::connection(format!(
                "create index {}: {e}",
                self.index_name
            ))),
        }
    }

    /// Fetch one record by key, or `None` when the key is absent.
    async fn fetch(&self, key: &str) -> StoreResult<Option<R>> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .arg("$")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::connection(format!("JSON.GET {key}: {e}")))?;

        let Some(text) = reply else {
            return Ok(None);
        };
        // Path queries return an array of matches; `$` has exactly one.
        let matched: Vec<R> = serde_json::from_str(&text)
            .map_err(|e| StoreError::malformed(format!("parse {key}: {e}")))?;

        Ok(matched.into_iter().next())
    }

    async fn store(&self, key: &str, record: &R) -> StoreResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| StoreError::io(format!("serialize {key}: {e}")))?;

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("JSON.SET")
            .arg(key)
            .arg("$")
            .arg(json)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::connection(format!("JSON.SET {key}: {e}")))?;
        Ok(())
    }

    async fn key_exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let found: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::connection(format!("EXISTS {key}: {e}")))?;
        Ok(found > 0)
    }

    /// Walk the whole key namespace with cursor-paged SCAN.
    async fn scan_keys(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.config.root_name);

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(REDIS_SCAN_PAGE_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::connection(format!("SCAN {pattern}: {e}")))?;

            keys.extend(page);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }

    fn sort_by_uuid(mut records: Vec<R>) -> Vec<R> {
        records.sort_by_key(|r| r.id().uuid());
        records
    }
}

/// Backslash-escape query syntax characters in a raw search term.
fn escape_search_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if SEARCH_SPECIAL_CHARS.contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the index query for one field. The `id` field is a TAG and uses
/// brace syntax; everything else is a TEXT wildcard-contains match.
fn search_query(field: &str, term: &str) -> String {
    let escaped = escape_search_term(term);
    if field == "id" {
        format!("@id:{{*{escaped}*}}")
    } else {
        format!("@{field}:*{escaped}*")
    }
}

// =============================================================================
// StorageBackend
// =============================================================================

#[async_trait]
impl<R: StoredRecord> StorageBackend<R> for RedisBackend<R> {
    async fn find_all(&self) -> StoreResult<Vec<R>> {
        let mut all = Vec::new();
        for key in self.scan_keys().await? {
            if let Some(record) = self.fetch(&key).await? {
                all.push(record);
            }
        }
        Ok(Self::sort_by_uuid(all))
    }

    async fn find_by_id(&self, id: &Uuid2) -> StoreResult<R> {
        self.fetch(&self.record_key(id))
            .await?
            .ok_or_else(|| StoreError::not_found(id))
    }

    #[instrument(skip(self))]
    async fn find_by_field(&self, field: &str, term: &str) -> StoreResult<Vec<R>> {
        validate_term(term)?;
        if self.fields.accessor(field).is_none() {
            return Err(StoreError::malformed(format!("unknown field: {field}")));
        }

        let query = search_query(field, term);
        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("FT.SEARCH")
            .arg(&self.index_name)
            .arg(&query)
            .arg("NOCONTENT")
            .arg("LIMIT")
            .arg(0)
            .arg(REDIS_SEARCH_RESULTS_COUNT_MAX)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::connection(format!("FT.SEARCH {query}: {e}")))?;

        // NOCONTENT reply: [total, key, key, ...]. Hits are re-fetched so
        // results reflect the documents, not the index.
        let Value::Array(items) = reply else {
            return Err(StoreError::connection(format!(
                "unexpected FT.SEARCH reply for {query}"
            )));
        };

        let mut hits = Vec::new();
        for item in items.into_iter().skip(1) {
            let Value::BulkString(bytes) = item else {
                continue;
            };
            let key = String::from_utf8(bytes)
                .map_err(|e| StoreError::malformed(format!("non-utf8 key in search hits: {e}")))?;
            if let Some(record) = self.fetch(&key).await? {
                hits.push(record);
            }
        }

        Ok(Self::sort_by_uuid(hits))
    }

    async fn add(&self, record: R) -> StoreResult<R> {
        let key = self.record_key(&record.id());
        if self.key_exists(&key).await? {
            return Err(StoreError::already_exists(record.id()));
        }
        self.store(&key, &record).await?;

        Ok(record)
    }

    async fn update(&self, record: R) -> StoreResult<R> {
        let key = self.record_key(&record.id());
        if !self.key_exists(&key).await? {
            return Err(StoreError::not_found(record.id()));
        }
        self.store(&key, &record).await?;

        Ok(record)
    }

    async fn upsert(&self, record: R) -> StoreResult<R> {
        let key = self.record_key(&record.id());
        self.store(&key, &record).await?;

        Ok(record)
    }

    async fn delete(&self, record: &R) -> StoreResult<bool> {
        self.delete_by_id(&record.id()).await
    }

    async fn delete_by_id(&self, id: &Uuid2) -> StoreResult<bool> {
        let key = self.record_key(id);
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::connection(format!("DEL {key}: {e}")))?;

        Ok(removed > 0)
    }

    /// Deletes every document in the namespace, then drops the search index.
    #[instrument(skip(self))]
    async fn delete_all(&self) -> StoreResult<()> {
        let keys = self.scan_keys().await?;
        if !keys.is_empty() {
            let mut conn = self.conn.clone();
            let _: () = redis::cmd("DEL")
                .arg(&keys)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::connection(format!("DEL namespace: {e}")))?;
        }

        let mut conn = self.conn.clone();
        let dropped: Result<(), redis::RedisError> = redis::cmd("FT.DROPINDEX")
            .arg(&self.index_name)
            .query_async(&mut conn)
            .await;
        match dropped {
            Ok(()) => Ok(()),
            Err(e) if e.to_string().to_lowercase().contains("unknown index") => {
                warn!(index = %self.index_name, "search index already dropped");
                Ok(())
            }
            Err(e) => Err(StoreError::connection(format!(
                "drop index {}: {e}",
                self.index_name
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::testing::{book_fields, BookRecord};
    use super::*;

    #[test]
    fn test_escape_search_term() {
        assert_eq!(escape_search_term("hobbit"), "hobbit");
        assert_eq!(escape_search_term("J.R.R."), "J\\.R\\.R\\.");
        assert_eq!(escape_search_term("a-b@c"), "a\\-b\\@c");
    }

    #[test]
    fn test_search_query_shapes() {
        assert_eq!(search_query("title", "hobbit"), "@title:*hobbit*");
        assert_eq!(search_query("id", "0001"), "@id:{*0001*}");
    }

    // Backend tests need a live Redis Stack (JSON + Search modules);
    // set TEST_REDIS_URL to run them, e.g. redis://localhost:6379.
    macro_rules! require_redis {
        () => {
            match std::env::var("TEST_REDIS_URL") {
                Ok(url) => url,
                Err(_) => {
                    eprintln!("skipping: TEST_REDIS_URL not set");
                    return;
                }
            }
        };
    }

    async fn connect(url: &str) -> RedisBackend<BookRecord> {
        // Unique root per test run keeps namespaces from colliding.
        let root = format!("booktest_{}", uuid::Uuid::new_v4().simple());
        RedisBackend::connect(RedisConfig::new(url, root), book_fields())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let url = require_redis!();
        let store = connect(&url).await;
        let mut book = BookRecord::fake(1, "The Hobbit", "J.R.R. Tolkien");

        store.add(book.clone()).await.unwrap();
        assert_eq!(store.find_by_id(&book.id).await.unwrap(), book);

        let err = store.add(book.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        book.title = "The UPDATED Hobbit".to_string();
        store.update(book.clone()).await.unwrap();
        assert_eq!(
            store.find_by_id(&book.id).await.unwrap().title,
            "The UPDATED Hobbit"
        );

        assert!(store.delete(&book).await.unwrap());
        assert!(!store.delete(&book).await.unwrap());
        assert!(store.find_by_id(&book.id).await.unwrap_err().is_not_found());

        store.delete_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_search_by_field_and_id() {
        let url = require_redis!();
        let store = connect(&url).await;
        let hobbit = BookRecord::fake(1, "The Hobbit", "J.R.R. Tolkien");
        let dune = BookRecord::fake(2, "Dune", "Frank Herbert");

        store.add(hobbit.clone()).await.unwrap();
        store.add(dune.clone()).await.unwrap();

        let hits = store.find_by_field("title", "obbi").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "The Hobbit");

        let hits = store.find_by_field("id", "000000000002").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Dune");

        let err = store.find_by_field("isbn", "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));

        store.delete_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_keeps_single_char_search_working() {
        let url = require_redis!();
        let root = format!("booktest_{}", uuid::Uuid::new_v4().simple());

        let store = RedisBackend::connect(RedisConfig::new(&url, &root), book_fields())
            .await
            .unwrap();
        store
            .add(BookRecord::fake(1, "Dune", "Frank Herbert"))
            .await
            .unwrap();

        // A second construction finds the existing index; MINPREFIX must
        // still be applied so one-character wildcards keep matching.
        let again = RedisBackend::connect(RedisConfig::new(&url, &root), book_fields())
            .await
            .unwrap();
        let hits = again.find_by_field("title", "u").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Dune");

        again.delete_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all_clears_namespace() {
        let url = require_redis!();
        let store = connect(&url).await;
        for i in 1..=3 {
            store
                .add(BookRecord::fake(i, &format!("Book {i}"), "Author"))
                .await
                .unwrap();
        }
        assert_eq!(store.find_all().await.unwrap().len(), 3);

        store.delete_all().await.unwrap();

        assert!(store.find_all().await.unwrap().is_empty());
    }
}
