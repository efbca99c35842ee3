use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{LocaleFilter, LocaleItem, LocaleQuery, LocaleStore, MassiveResult};
use crate::config::StorageConfig;
use crate::error::{LocaleMgmtError, Result};

const SELECT_ITEM: &str = "SELECT id, item_key, bundle, lang, content FROM locale_items";

fn storage_error(e: anyhow::Error) -> LocaleMgmtError {
    LocaleMgmtError::Storage(format!("{:#}", e))
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<LocaleItem> {
    Ok(LocaleItem {
        id: row.get(0)?,
        key: row.get(1)?,
        bundle: row.get(2)?,
        lang: row.get(3)?,
        content: row.get(4)?,
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Insert or update by `(bundle, item_key, lang)` and return the row id.
fn upsert_row(conn: &Connection, item: &LocaleItem) -> rusqlite::Result<String> {
    conn.execute(
        "INSERT INTO locale_items (id, item_key, bundle, lang, content, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(bundle, item_key, lang)
         DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            item.key,
            item.bundle,
            item.lang,
            item.content,
            Utc::now().to_rfc3339()
        ],
    )?;

    conn.query_row(
        "SELECT id FROM locale_items WHERE bundle = ?1 AND item_key = ?2 AND lang = ?3",
        params![item.bundle, item.key, item.lang],
        |row| row.get(0),
    )
}

/// SQLite-backed locale store
///
/// Every operation opens its own connection on a blocking thread.
#[derive(Debug, Clone)]
pub struct SqliteLocaleStore {
    db_path: PathBuf,
}

impl SqliteLocaleStore {
    /// Open the store configured in `config`, falling back to the platform
    /// data directory.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match &config.db_path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Open `locale.db` in the user's data directory.
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("org", "locale-mgmt", "locale-mgmt")
            .ok_or_else(|| LocaleMgmtError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("locale.db"))
    }

    /// Open the database at `db_path`, creating it and its parent directory.
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(storage_error)?;
        }

        let store = Self { db_path };
        store.init()?;
        tracing::info!(path = %store.db_path.display(), "Opened locale store");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init(&self) -> Result<()> {
        let conn = open(&self.db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS locale_items (
                id TEXT PRIMARY KEY,
                item_key TEXT NOT NULL,
                bundle TEXT NOT NULL,
                lang TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL,
                UNIQUE (bundle, item_key, lang)
            );
            CREATE INDEX IF NOT EXISTS idx_locale_items_lang ON locale_items (lang);",
        )
        .context("Failed to create tables")
        .map_err(storage_error)?;
        Ok(())
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = open(&path)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| LocaleMgmtError::Storage(format!("storage task failed: {}", e)))?
    }
}

fn open(path: &Path) -> Result<Connection> {
    Ok(Connection::open(path)
        .context("Failed to open database")
        .map_err(storage_error)?)
}

#[async_trait]
impl LocaleStore for SqliteLocaleStore {
    async fn upsert(&self, item: LocaleItem) -> Result<LocaleItem> {
        item.validate()?;
        self.run(move |conn| {
            let id = upsert_row(conn, &item)
                .context("Failed to upsert locale item")
                .map_err(storage_error)?;
            Ok(LocaleItem { id, ..item })
        })
        .await
    }

    async fn upsert_many(&self, items: Vec<LocaleItem>) -> Result<MassiveResult> {
        self.run(move |conn| {
            let tx = conn
                .transaction()
                .context("Failed to start transaction")
                .map_err(storage_error)?;

            let mut result = MassiveResult::default();
            for item in &items {
                if !item.is_valid() {
                    result.num_failed += 1;
                    continue;
                }
                match upsert_row(&tx, item) {
                    Ok(_) => result.num_successful += 1,
                    Err(e) => {
                        tracing::warn!(bundle = %item.bundle, key = %item.key, error = %e, "Failed to upsert locale item");
                        result.num_failed += 1;
                    }
                }
            }

            tx.commit()
                .context("Failed to commit transaction")
                .map_err(storage_error)?;
            Ok(result)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<LocaleItem>> {
        let id = id.to_string();
        self.run(move |conn| {
            Ok(conn
                .query_row(&format!("{} WHERE id = ?1", SELECT_ITEM), params![id], row_to_item)
                .optional()
                .context("Failed to load locale item")
                .map_err(storage_error)?)
        })
        .await
    }

    async fn query(&self, query: &LocaleQuery) -> Result<Vec<LocaleItem>> {
        let mut sql = format!("{} WHERE 1 = 1", SELECT_ITEM);
        let mut args: Vec<Value> = Vec::new();

        if let Some(key) = non_empty(&query.key) {
            sql.push_str(" AND item_key LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(key)));
        }
        if let Some(bundle) = non_empty(&query.bundle) {
            sql.push_str(" AND bundle = ?");
            args.push(Value::Text(bundle.to_string()));
        }
        if let Some(lang) = non_empty(&query.lang) {
            sql.push_str(" AND lang = ?");
            args.push(Value::Text(lang.to_string()));
        }
        if let Some(content) = non_empty(&query.content) {
            sql.push_str(" AND content LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(content)));
        }

        sql.push_str(" ORDER BY bundle, lang, item_key");

        if query.limit > 0 || query.offset > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
            let limit = if query.limit > 0 {
                i64::from(query.limit)
            } else {
                -1
            };
            args.push(Value::Integer(limit));
            args.push(Value::Integer(i64::from(query.offset)));
        }

        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .context("Failed to prepare query")
                .map_err(storage_error)?;
            let items = stmt
                .query_map(params_from_iter(args.iter()), row_to_item)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .context("Failed to query locale items")
                .map_err(storage_error)?;
            Ok(items)
        })
        .await
    }

    async fn delete(&self, filter: &LocaleFilter) -> Result<u64> {
        if filter.bundle.is_empty() {
            return Err(LocaleMgmtError::Validation("bundle must not be empty".to_string()).into());
        }

        let mut sql = String::from("DELETE FROM locale_items WHERE bundle = ?");
        let mut args = vec![filter.bundle.clone()];
        if let Some(lang) = non_empty(&filter.lang) {
            sql.push_str(" AND lang = ?");
            args.push(lang.to_string());
        }
        if let Some(key) = non_empty(&filter.key) {
            sql.push_str(" AND item_key = ?");
            args.push(key.to_string());
        }

        self.run(move |conn| {
            let removed = conn
                .execute(&sql, params_from_iter(args.iter()))
                .context("Failed to delete locale items")
                .map_err(storage_error)?;
            Ok(removed as u64)
        })
        .await
    }

    async fn langs(&self, bundle: Option<&str>) -> Result<Vec<String>> {
        let bundle = bundle.map(str::to_string);
        self.run(move |conn| {
            let (sql, args) = match bundle {
                Some(bundle) => (
                    "SELECT DISTINCT lang FROM locale_items WHERE bundle = ?1 ORDER BY lang",
                    vec![bundle],
                ),
                None => ("SELECT DISTINCT lang FROM locale_items ORDER BY lang", vec![]),
            };
            distinct_strings(conn, sql, args)
        })
        .await
    }

    async fn bundles(&self) -> Result<Vec<String>> {
        self.run(|conn| {
            distinct_strings(
                conn,
                "SELECT DISTINCT bundle FROM locale_items ORDER BY bundle",
                Vec::new(),
            )
        })
        .await
    }
}

fn distinct_strings(conn: &Connection, sql: &str, args: Vec<String>) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(sql)
        .context("Failed to prepare query")
        .map_err(storage_error)?;
    let values = stmt
        .query_map(params_from_iter(args.iter()), |row| row.get(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
        .context("Failed to list distinct values")
        .map_err(storage_error)?;
    Ok(values)
}
