//! `Uuid2` - Type-Tagged Identifiers
//!
//! A type-safe wrapper pairing a raw UUID value with an explicit type tag,
//! used as the universal key type across every storage backend.
//!
//! # Wire Format
//!
//! ```text
//! UUID2:Model.DomainInfo.BookInfo@00000000-0000-0000-0000-000000000001
//! ▲▲▲▲▲-- always the literal `UUID2`
//!      ▲-- `:` divides the prefix from the type tag
//!       ▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲▲-- type tag (dot-separated path)
//!                                ▲-- `@` divides the type tag from the UUID
//! ```
//!
//! # Equality and Hashing
//!
//! Two identifiers are *fully* equal iff both the UUID and the type tag
//! match. [`Uuid2::is_same_uuid`] compares the UUID alone, which correlates
//! different type views of one underlying value (a `User` and its `Account`
//! sharing a UUID). Hashing covers the raw UUID ONLY, so those two views
//! land in the same map bucket.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::ID_FAKE_VALUE_MAX;

/// Literal prefix of the string encoding.
pub const UUID2_PREFIX: &str = "UUID2";

/// Type tag used when no concrete type is declared.
pub const TYPE_TAG_UNTYPED: &str = "UUID";

// =============================================================================
// TypeTagged
// =============================================================================

/// Statically declared type tag for a domain type.
///
/// The tag is a dot-separated path, e.g. `"Model.DomainInfo.BookInfo"`,
/// declared once at the type's definition site. No runtime type
/// introspection is involved.
pub trait TypeTagged {
    /// The type tag carried by identifiers of this type.
    const TYPE_TAG: &'static str;
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from identifier parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Uuid2Error {
    /// The input does not match the `UUID2:<type-tag>@<uuid>` encoding.
    #[error("malformed identifier: {message}")]
    Malformed {
        /// What was wrong with the input.
        message: String,
    },
}

impl Uuid2Error {
    /// Create a malformed-identifier error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

// =============================================================================
// Uuid2
// =============================================================================

/// A type-tagged unique identifier wrapping a raw UUID value.
///
/// Immutable once constructed; re-tagging produces a new value.
///
/// # Example
///
/// ```
/// use shelfdb::uuid2::{TypeTagged, Uuid2};
///
/// struct BookInfo;
/// impl TypeTagged for BookInfo {
///     const TYPE_TAG: &'static str = "Model.DomainInfo.BookInfo";
/// }
///
/// let id = Uuid2::generate::<BookInfo>();
/// let text = id.to_string();
/// assert!(text.starts_with("UUID2:Model.DomainInfo.BookInfo@"));
/// assert_eq!(text.parse::<Uuid2>().unwrap(), id);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uuid2 {
    uuid: Uuid,
    #[serde(rename = "type")]
    type_tag: String,
}

impl Uuid2 {
    /// Create an identifier from a raw UUID and an explicit type tag.
    #[must_use]
    pub fn new(uuid: Uuid, type_tag: impl Into<String>) -> Self {
        Self {
            uuid,
            type_tag: type_tag.into(),
        }
    }

    /// Create an untyped identifier from a raw UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self::new(uuid, TYPE_TAG_UNTYPED)
    }

    /// Generate a random identifier tagged with `T`'s declared type tag.
    #[must_use]
    pub fn generate<T: TypeTagged + ?Sized>() -> Self {
        Self::new(Uuid::new_v4(), T::TYPE_TAG)
    }

    /// Wrap an existing raw UUID with `T`'s declared type tag.
    #[must_use]
    pub fn tagged<T: TypeTagged + ?Sized>(uuid: Uuid) -> Self {
        Self::new(uuid, T::TYPE_TAG)
    }

    /// Re-tag this identifier with an explicit type tag, keeping the UUID.
    #[must_use]
    pub fn with_tag(&self, type_tag: impl Into<String>) -> Self {
        Self::new(self.uuid, type_tag)
    }

    /// Re-tag this identifier with `T`'s declared type tag, keeping the UUID.
    #[must_use]
    pub fn retag<T: TypeTagged + ?Sized>(&self) -> Self {
        Self::new(self.uuid, T::TYPE_TAG)
    }

    /// Create a well-known identifier for tests and fixtures.
    ///
    /// The UUID is `00000000-0000-0000-0000-<value padded to 12 digits>`,
    /// so fixture ids are stable and readable in dumps.
    ///
    /// # Panics
    /// Panics if `value` exceeds [`ID_FAKE_VALUE_MAX`].
    #[must_use]
    pub fn create_fake<T: TypeTagged + ?Sized>(value: u64) -> Self {
        assert!(
            value <= ID_FAKE_VALUE_MAX,
            "fake id value {value} exceeds max {ID_FAKE_VALUE_MAX}"
        );

        let text = format!("00000000-0000-0000-0000-{value:012}");
        let uuid = Uuid::parse_str(&text).expect("fixed-width fake uuid is always valid");
        Self::tagged::<T>(uuid)
    }

    /// The raw UUID value.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The type tag.
    #[must_use]
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Whether `other` refers to the same raw UUID, regardless of type tag.
    #[must_use]
    pub fn is_same_uuid(&self, other: &Uuid2) -> bool {
        self.uuid == other.uuid
    }

    /// Whether `other` carries the same type tag.
    #[must_use]
    pub fn is_same_type(&self, other: &Uuid2) -> bool {
        self.type_tag == other.type_tag
    }
}

impl PartialEq for Uuid2 {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid && self.type_tag == other.type_tag
    }
}

impl Eq for Uuid2 {}

impl Hash for Uuid2 {
    // Hashes the raw UUID only. Full equality implies equal UUIDs, so the
    // Eq/Hash contract holds, and two type views of one UUID share a bucket.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for Uuid2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{UUID2_PREFIX}:{}@{}", self.type_tag, self.uuid)
    }
}

impl FromStr for Uuid2 {
    type Err = Uuid2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        let Some((prefix, uuid_text)) = text.split_once('@') else {
            return Err(Uuid2Error::malformed(format!(
                "missing `@` segment divider: {text}"
            )));
        };
        if uuid_text.contains('@') {
            return Err(Uuid2Error::malformed(format!(
                "expected exactly one `@` segment divider: {text}"
            )));
        }

        let Some((literal, type_tag)) = prefix.split_once(':') else {
            return Err(Uuid2Error::malformed(format!(
                "missing `:` between prefix and type tag: {text}"
            )));
        };
        if literal != UUID2_PREFIX {
            return Err(Uuid2Error::malformed(format!(
                "missing `{UUID2_PREFIX}` prefix: {text}"
            )));
        }
        if type_tag.is_empty() {
            return Err(Uuid2Error::malformed(format!("empty type tag: {text}")));
        }

        let uuid = Uuid::parse_str(uuid_text)
            .map_err(|e| Uuid2Error::malformed(format!("bad uuid `{uuid_text}`: {e}")))?;

        Ok(Self::new(uuid, type_tag))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashMap;

    use super::*;

    struct BookInfo;
    impl TypeTagged for BookInfo {
        const TYPE_TAG: &'static str = "Model.DomainInfo.BookInfo";
    }

    struct AccountInfo;
    impl TypeTagged for AccountInfo {
        const TYPE_TAG: &'static str = "Model.DomainInfo.AccountInfo";
    }

    fn hash_of(id: &Uuid2) -> u64 {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_display_format() {
        let id = Uuid2::create_fake::<BookInfo>(1);
        assert_eq!(
            id.to_string(),
            "UUID2:Model.DomainInfo.BookInfo@00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        let id = Uuid2::generate::<BookInfo>();
        let parsed: Uuid2 = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.type_tag(), "Model.DomainInfo.BookInfo");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let parsed: Uuid2 = "  UUID2:Role.User@00000000-0000-0000-0000-000000000001\n"
            .parse()
            .unwrap();
        assert_eq!(parsed.type_tag(), "Role.User");
    }

    #[test]
    fn test_parse_rejects_missing_at() {
        let err = "UUID2:Role.User-00000000-0000-0000-0000-000000000001"
            .parse::<Uuid2>()
            .unwrap_err();
        assert!(matches!(err, Uuid2Error::Malformed { .. }));
    }

    #[test]
    fn test_parse_rejects_double_at() {
        assert!("UUID2:Role.User@@00000000-0000-0000-0000-000000000001"
            .parse::<Uuid2>()
            .is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_prefix() {
        assert!("UUID3:Role.User@00000000-0000-0000-0000-000000000001"
            .parse::<Uuid2>()
            .is_err());
        assert!("Role.User@00000000-0000-0000-0000-000000000001"
            .parse::<Uuid2>()
            .is_err());
    }

    #[test]
    fn test_parse_rejects_bad_uuid() {
        assert!("UUID2:Role.User@not-a-uuid".parse::<Uuid2>().is_err());
    }

    #[test]
    fn test_full_vs_uuid_only_equality() {
        let book = Uuid2::create_fake::<BookInfo>(42);
        let account = book.retag::<AccountInfo>();

        assert_ne!(book, account);
        assert!(book.is_same_uuid(&account));
        assert!(!book.is_same_type(&account));

        // Encodings differ only in the type-tag segment.
        let book_text = book.to_string();
        let account_text = account.to_string();
        assert_eq!(
            book_text.split('@').nth(1),
            account_text.split('@').nth(1)
        );
        assert_ne!(book_text, account_text);
    }

    #[test]
    fn test_hash_keyed_on_uuid_only() {
        let book = Uuid2::create_fake::<BookInfo>(7);
        let account = book.retag::<AccountInfo>();
        assert_eq!(hash_of(&book), hash_of(&account));
    }

    #[test]
    fn test_map_keys_distinguish_type_views() {
        // Same bucket, but full equality still separates the entries.
        let book = Uuid2::create_fake::<BookInfo>(7);
        let account = book.retag::<AccountInfo>();

        let mut map = HashMap::new();
        map.insert(book.clone(), "book");
        map.insert(account.clone(), "account");

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&book), Some(&"book"));
        assert_eq!(map.get(&account), Some(&"account"));
    }

    #[test]
    fn test_json_shape() {
        let id = Uuid2::create_fake::<BookInfo>(100);
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "uuid": "00000000-0000-0000-0000-000000000100",
                "type": "Model.DomainInfo.BookInfo",
            })
        );

        let back: Uuid2 = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    #[should_panic(expected = "fake id value")]
    fn test_create_fake_rejects_oversized_value() {
        let _ = Uuid2::create_fake::<BookInfo>(ID_FAKE_VALUE_MAX + 1);
    }

    #[test]
    fn test_with_tag() {
        let id = Uuid2::generate::<BookInfo>();
        let untyped = id.with_tag(TYPE_TAG_UNTYPED);
        assert!(id.is_same_uuid(&untyped));
        assert_eq!(untyped.type_tag(), "UUID");
    }
}
