//! Dedup ledger for Mirrorcast
//!
//! One SQLite file per mirrored account remembers which source posts were
//! already mirrored and where. The ledger is append-only: rows are inserted
//! once and never updated or deleted.
//!
//! Columns of the `posts` table are the snake_case forms of the record
//! fields: `source_id` (sourceId), `page_id` (pageId), `destination_post_id`
//! (destinationPostId), `destination_server_url` (destinationServerUrl),
//! plus `mirrored_at`.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{DbError, MirrorError, Result};
use crate::types::MirrorRecord;

/// Bound ids per `IN (...)` query. SQLite builds before 3.32 cap host
/// parameters at 999.
const ID_CHUNK_SIZE: usize = 500;

const CREATE_POSTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS posts (
        source_id TEXT PRIMARY KEY NOT NULL,
        page_id TEXT NOT NULL,
        destination_post_id TEXT NOT NULL,
        destination_server_url TEXT NOT NULL,
        mirrored_at INTEGER NOT NULL
    )
"#;

/// Handle on one account's ledger
///
/// Returned by [`Ledger::open`] and owned by the caller for the length of
/// one account run. The schema is created on first use, not at open time.
pub struct Ledger {
    pool: SqlitePool,
    path: PathBuf,
    schema_ready: OnceCell<()>,
}

impl Ledger {
    /// Open (creating if needed) the ledger file `location/name`
    pub async fn open(location: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(location).map_err(DbError::Io)?;
        let path = location.join(name);

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        // One connection keeps every statement of a run strictly ordered.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(DbError::Sqlx)?;

        debug!(path = %path.display(), "opened ledger");

        Ok(Self {
            pool,
            path,
            schema_ready: OnceCell::new(),
        })
    }

    /// Open an in-memory ledger, for tests
    pub async fn in_memory() -> Result<Self> {
        // The database lives only as long as its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::Sqlx)?;

        Ok(Self {
            pool,
            path: PathBuf::from(":memory:"),
            schema_ready: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the `posts` table if it does not exist yet
    ///
    /// Safe to call any number of times; existing rows are never touched.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_POSTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;
        Ok(())
    }

    async fn ready(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| self.ensure_schema())
            .await?;
        Ok(())
    }

    /// Return the subset of `ids` already present in the ledger
    pub async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        self.ready().await?;

        let mut found = HashSet::new();
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let mut query = QueryBuilder::<Sqlite>::new("SELECT source_id FROM posts WHERE source_id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let rows: Vec<(String,)> = query
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::Sqlx)?;

            found.extend(rows.into_iter().map(|(id,)| id));
        }

        Ok(found)
    }

    /// Insert one record
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::ConstraintViolation` if the source id is already
    /// recorded. There is no upsert.
    pub async fn add_record(&self, record: &MirrorRecord) -> Result<()> {
        self.ready().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO posts (source_id, page_id, destination_post_id, destination_server_url, mirrored_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.source_id)
        .bind(&record.page_id)
        .bind(&record.destination_post_id)
        .bind(&record.destination_server_url)
        .bind(record.mirrored_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(MirrorError::ConstraintViolation(format!(
                    "source post {} is already recorded in {}",
                    record.source_id,
                    self.path.display()
                )))
            }
            Err(e) => Err(DbError::Sqlx(e).into()),
        }
    }

    /// Most recent records first
    pub async fn list_records(&self, limit: usize) -> Result<Vec<MirrorRecord>> {
        self.ready().await?;

        let records = sqlx::query_as::<_, MirrorRecord>(
            r#"
            SELECT source_id, page_id, destination_post_id, destination_server_url, mirrored_at
            FROM posts
            ORDER BY mirrored_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        Ok(records)
    }

    pub async fn count(&self) -> Result<i64> {
        self.ready().await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        Ok(count)
    }

    /// Release the underlying connection
    pub async fn close(self) {
        self.pool.close().await;
        debug!(path = %self.path.display(), "closed ledger");
    }
}
