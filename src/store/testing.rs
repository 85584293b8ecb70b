//! Shared test fixtures for the backend test suites.

use serde::{Deserialize, Serialize};

use super::backend::FieldMap;
use super::record::StoredRecord;
use crate::uuid2::{TypeTagged, Uuid2};

/// A small book record used across backend tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BookRecord {
    pub id: Uuid2,
    pub title: String,
    pub author: String,
}

impl TypeTagged for BookRecord {
    const TYPE_TAG: &'static str = "Model.DomainInfo.BookInfo";
}

impl StoredRecord for BookRecord {
    fn id(&self) -> Uuid2 {
        self.id.clone()
    }
}

impl BookRecord {
    pub fn fake(value: u64, title: &str, author: &str) -> Self {
        Self {
            id: Uuid2::create_fake::<Self>(value),
            title: title.to_string(),
            author: author.to_string(),
        }
    }
}

pub(crate) fn book_fields() -> FieldMap<BookRecord> {
    FieldMap::new()
        .with_field("title", |b: &BookRecord| b.title.clone())
        .with_field("author", |b: &BookRecord| b.author.clone())
        .with_field("id", |b: &BookRecord| b.id.to_string())
}
