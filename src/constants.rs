//! Named limits and defaults.
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`.
//! Every constant includes units in the name where applicable:
//! - `_MS` for milliseconds
//! - `_COUNT_MAX` for quantity limits
//! - `_BYTES_MAX` for size limits

// =============================================================================
// File Backend
// =============================================================================

/// Interval between polls for the canonical database file.
pub const FILE_POLL_INTERVAL_MS_DEFAULT: u64 = 100;

/// Maximum number of polling attempts before a file operation fails
/// with `Unavailable`. At the default interval this is a 5 second budget.
pub const FILE_POLL_ATTEMPTS_COUNT_MAX: u32 = 50;

/// Prefix applied to the canonical file name to form the hidden
/// (in-flight) file name used during the rename-swap write protocol.
pub const FILE_HIDDEN_PREFIX: &str = "__";

// =============================================================================
// Redis Backend
// =============================================================================

/// Number of keys requested per SCAN page when walking a namespace.
pub const REDIS_SCAN_PAGE_COUNT: usize = 100;

/// Maximum number of hits taken from a single search-index query.
pub const REDIS_SEARCH_RESULTS_COUNT_MAX: usize = 100;

/// Suffix appended to the database root name to form the search index name.
pub const REDIS_SEARCH_INDEX_SUFFIX: &str = "_index";

// =============================================================================
// Search
// =============================================================================

/// Maximum length of a `find_by_field` search term.
pub const SEARCH_TERM_BYTES_MAX: usize = 1024;

// =============================================================================
// Identifiers
// =============================================================================

/// Largest value accepted by the fake-identifier helper used in tests;
/// anything larger would not fit the zero-padded UUID tail.
pub const ID_FAKE_VALUE_MAX: u64 = 999_999_999;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polling_budget_reasonable() {
        // Total budget stays in the seconds range, not minutes.
        let budget_ms = FILE_POLL_INTERVAL_MS_DEFAULT * u64::from(FILE_POLL_ATTEMPTS_COUNT_MAX);
        assert!(budget_ms >= 1000);
        assert!(budget_ms <= 60_000);
    }

    #[test]
    fn test_scan_page_positive() {
        assert!(REDIS_SCAN_PAGE_COUNT > 0);
        assert!(REDIS_SEARCH_RESULTS_COUNT_MAX > 0);
    }

    #[test]
    fn test_fake_id_fits_uuid_tail() {
        // The UUID tail segment holds 12 decimal digits.
        assert!(ID_FAKE_VALUE_MAX < 1_000_000_000_000);
    }
}
