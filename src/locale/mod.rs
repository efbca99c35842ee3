//! Locale items and their storage contract
//!
//! A locale item is one translated string: a `key` inside a `bundle`, in one
//! `lang`. The triple `(bundle, key, lang)` identifies an item; writing the
//! same triple again replaces its content and keeps its id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LocaleMgmtError, Result};

pub mod sqlite;

pub use sqlite::SqliteLocaleStore;

/// One translated string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleItem {
    /// Server-assigned id; ignored on write
    #[serde(default)]
    pub id: String,
    pub key: String,
    pub bundle: String,
    pub lang: String,
    #[serde(default)]
    pub content: String,
}

impl LocaleItem {
    pub fn new(
        key: impl Into<String>,
        bundle: impl Into<String>,
        lang: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            key: key.into(),
            bundle: bundle.into(),
            lang: lang.into(),
            content: content.into(),
        }
    }

    /// Items need a key, a bundle and a language.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("key", &self.key),
            ("bundle", &self.bundle),
            ("lang", &self.lang),
        ] {
            if value.trim().is_empty() {
                return Err(
                    LocaleMgmtError::Validation(format!("{} must not be empty", field)).into(),
                );
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Read filter. `key` and `content` match substrings; `bundle` and `lang`
/// match exactly. A limit or offset of 0 means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleQuery {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

/// Delete filter; every given field must match exactly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleFilter {
    pub bundle: String,
    pub lang: Option<String>,
    pub key: Option<String>,
}

/// Outcome of a bulk write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassiveResult {
    pub num_successful: u64,
    pub num_failed: u64,
}

/// Locale persistence
#[async_trait]
pub trait LocaleStore: Send + Sync {
    /// Insert or replace one item, returning it with its id
    async fn upsert(&self, item: LocaleItem) -> Result<LocaleItem>;

    /// Insert or replace many items in one transaction; invalid items are
    /// counted as failed and skipped
    async fn upsert_many(&self, items: Vec<LocaleItem>) -> Result<MassiveResult>;

    async fn get(&self, id: &str) -> Result<Option<LocaleItem>>;

    async fn query(&self, query: &LocaleQuery) -> Result<Vec<LocaleItem>>;

    /// Delete matching items, returning how many were removed
    async fn delete(&self, filter: &LocaleFilter) -> Result<u64>;

    /// Distinct languages, optionally within one bundle
    async fn langs(&self, bundle: Option<&str>) -> Result<Vec<String>>;

    async fn bundles(&self) -> Result<Vec<String>>;
}
