//! Pending change store: uncommitted edits kept in SQLite.
//!
//! Rows are scoped by an origin prefix and a project id. A tombstone is
//! never stored; it deletes the row instead. Driver calls run on tokio's
//! blocking pool so a shared driver never stalls the runtime.

use crate::drivers::TexelDriver;
use crate::types::{Project, Texel};
use async_trait::async_trait;
use chrono::Utc;
use eyre::{Context, Result};
use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Pending change driver.
pub struct ChangeDriver {
    store: Arc<Store>,
}

struct Store {
    prefix: String,
    db: Mutex<Connection>,
}

impl ChangeDriver {
    /// Open (or create) the change store at `path`.
    pub fn open(prefix: impl Into<String>, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create change store directory")?;
        }
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        Self::with_connection(prefix, db)
    }

    /// A store that lives only as long as the driver.
    pub fn in_memory(prefix: impl Into<String>) -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(prefix, db)
    }

    fn with_connection(prefix: impl Into<String>, db: Connection) -> Result<Self> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS changes (
                prefix TEXT NOT NULL,
                project_id TEXT NOT NULL,
                domain TEXT NOT NULL,
                key TEXT NOT NULL,
                locale TEXT NOT NULL,
                value TEXT NOT NULL,
                staged_at TEXT NOT NULL,
                PRIMARY KEY (prefix, project_id, domain, key, locale)
            );
        "#,
        )
        .context("Failed to initialize schema")?;

        Ok(Self {
            store: Arc::new(Store {
                prefix: prefix.into(),
                db: Mutex::new(db),
            }),
        })
    }

    /// Remove all pending changes of a project, e.g. after they were committed.
    pub fn clear(&self, id: &str) -> Result<usize> {
        self.store.clear(id)
    }

    /// Number of pending changes of a project.
    pub fn count(&self, id: &str) -> Result<usize> {
        self.store.count(id)
    }

    /// Run a store operation on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .context("Change store task failed")?
    }
}

impl Store {
    fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear(&self, id: &str) -> Result<usize> {
        let removed = self
            .db()
            .execute(
                "DELETE FROM changes WHERE prefix = ? AND project_id = ?",
                params![self.prefix, id],
            )
            .with_context(|| format!("Failed to clear pending changes of {}", id))?;
        Ok(removed)
    }

    fn count(&self, id: &str) -> Result<usize> {
        let count: i64 = self.db().query_row(
            "SELECT COUNT(*) FROM changes WHERE prefix = ? AND project_id = ?",
            params![self.prefix, id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list_rows(&self, id: &str) -> Result<Vec<Texel>> {
        let db = self.db();
        let mut stmt = db.prepare(
            r#"
            SELECT domain, key, locale, value
            FROM changes WHERE prefix = ? AND project_id = ?
            ORDER BY domain, key, locale
            "#,
        )?;

        let texels = stmt
            .query_map(params![self.prefix, id], |row| {
                Ok(Texel {
                    domain: row.get(0)?,
                    key: row.get(1)?,
                    locale: row.get(2)?,
                    value: Some(row.get(3)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(texels)
    }

    fn apply(&self, id: &str, changes: &[Texel]) -> Result<()> {
        let mut db = self.db();
        let tx = db.transaction().context("Failed to start transaction")?;
        let staged_at = Utc::now().to_rfc3339();

        for change in changes {
            match &change.value {
                Some(value) => {
                    tx.execute(
                        r#"
                        INSERT OR REPLACE INTO changes (prefix, project_id, domain, key, locale, value, staged_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?)
                        "#,
                        params![self.prefix, id, change.domain, change.key, change.locale, value, staged_at],
                    )?;
                }
                None => {
                    tx.execute(
                        "DELETE FROM changes WHERE prefix = ? AND project_id = ? AND domain = ? AND key = ? AND locale = ?",
                        params![self.prefix, id, change.domain, change.key, change.locale],
                    )?;
                }
            }
        }

        tx.commit().context("Failed to commit transaction")?;
        Ok(())
    }
}

#[async_trait]
impl TexelDriver for ChangeDriver {
    async fn project(&self, id: &str) -> Result<Project> {
        Ok(Project::leaf(id, "change"))
    }

    async fn projects(&self, _parent: Option<&str>) -> Result<Vec<Project>> {
        Ok(Vec::new())
    }

    async fn list(&self, id: &str) -> Result<Vec<Texel>> {
        let owned = id.to_string();
        self.blocking(move |store| store.list_rows(&owned))
            .await
            .with_context(|| format!("Failed to list pending changes of {}", id))
    }

    async fn update(&self, id: &str, changes: Vec<Texel>) -> Result<()> {
        let owned = id.to_string();
        self.blocking(move |store| store.apply(&owned, &changes))
            .await
            .with_context(|| format!("Failed to store pending changes of {}", id))
    }
}
