//! The story index: a corpus snapshot plus its embeddings.
//!
//! An index is built once per corpus snapshot by the `import` batch job,
//! persisted to a SQLite file, and loaded read-only at process start.
//! Serving never mutates an index; rebuilding means a fresh import that
//! produces a new snapshot, swapped in at the next start.
//!
//! Snapshot layout:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `stories` | story fields, ordered by `position` (corpus order) |
//! | `story_vectors` | one embedding BLOB per story (little-endian f32) |
//! | `index_meta` | `embedding_model`, `dims`, `built_at`, `story_count` |
//!
//! The embedding model name in `index_meta` is the version tag: all vectors
//! in one snapshot come from one model. Loading against a differently
//! configured model logs a warning (mixing versions is a load-time concern,
//! not re-checked per query); vectors whose length disagrees with the
//! recorded dims fail the load outright.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, vec_to_blob, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::Story;

/// An immutable, in-memory corpus of stories with their embeddings.
#[derive(Debug)]
pub struct StoryIndex {
    stories: Vec<Story>,
    vectors: Vec<Vec<f32>>,
    model_name: String,
    dims: usize,
}

impl StoryIndex {
    /// Pair up stories with their vectors. Lengths must agree.
    pub fn new(
        stories: Vec<Story>,
        vectors: Vec<Vec<f32>>,
        model_name: String,
        dims: usize,
    ) -> Result<Self> {
        if stories.len() != vectors.len() {
            return Err(Error::Snapshot(format!(
                "{} stories but {} vectors",
                stories.len(),
                vectors.len()
            )));
        }
        Ok(Self {
            stories,
            vectors,
            model_name,
            dims,
        })
    }

    /// Build an index from validated stories: drop stories whose embedding
    /// text is shorter than `min_story_chars`, then embed the remainder in
    /// provider-sized batches. Returns the index and how many stories the
    /// length filter removed.
    pub async fn build(
        stories: Vec<Story>,
        provider: &dyn EmbeddingProvider,
        min_story_chars: usize,
        batch_size: usize,
    ) -> Result<(Self, usize)> {
        let before = stories.len();
        let retained: Vec<Story> = stories
            .into_iter()
            .filter(|s| s.embedding_text().chars().count() >= min_story_chars)
            .collect();
        let skipped_short = before - retained.len();

        let batch_size = batch_size.max(1);
        let mut vectors = Vec::with_capacity(retained.len());
        for batch in retained.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.embedding_text()).collect();
            let mut batch_vectors = provider.embed(&texts).await?;
            vectors.append(&mut batch_vectors);
        }

        let index = Self::new(
            retained,
            vectors,
            provider.model_name().to_string(),
            provider.dims(),
        )?;
        Ok((index, skipped_short))
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Persist the index as a snapshot file, replacing any previous
    /// contents.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let pool = connect(path, true).await?;
        init_schema(&pool).await?;

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM story_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM stories").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;

        for (position, (story, vector)) in self.stories.iter().zip(self.vectors.iter()).enumerate()
        {
            let tags_json = serde_json::to_string(&story.tags)?;
            sqlx::query(
                r#"
                INSERT INTO stories (id, position, title, body, tags_json, author_id, created_at, parent_id, thread_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&story.id)
            .bind(position as i64)
            .bind(&story.title)
            .bind(&story.body)
            .bind(&tags_json)
            .bind(&story.author_id)
            .bind(story.created_at.timestamp())
            .bind(&story.parent_id)
            .bind(&story.thread_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO story_vectors (story_id, embedding) VALUES (?, ?)")
                .bind(&story.id)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        let built_at = chrono::Utc::now().timestamp();
        for (key, value) in [
            ("embedding_model", self.model_name.clone()),
            ("dims", self.dims.to_string()),
            ("built_at", built_at.to_string()),
            ("story_count", self.stories.len().to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        pool.close().await;
        Ok(())
    }

    /// Load a snapshot into memory.
    ///
    /// A missing file is [`Error::IndexNotLoaded`]. When `expected_model` is
    /// given and differs from the snapshot's tag, a warning is logged; the
    /// load proceeds since the caller may intentionally be inspecting an
    /// older snapshot.
    pub async fn load(path: &Path, expected_model: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::IndexNotLoaded);
        }

        let pool = connect(path, false).await?;

        let model_name = read_meta(&pool, "embedding_model").await?;
        let dims: usize = read_meta(&pool, "dims")
            .await?
            .parse()
            .map_err(|_| Error::Snapshot("dims metadata is not a number".to_string()))?;

        if let Some(expected) = expected_model {
            if expected != model_name {
                tracing::warn!(
                    snapshot_model = %model_name,
                    configured_model = %expected,
                    "index snapshot was built with a different embedding model; \
                     query vectors will not be comparable until the index is rebuilt"
                );
            }
        }

        let rows = sqlx::query(
            r#"
            SELECT s.id, s.title, s.body, s.tags_json, s.author_id, s.created_at,
                   s.parent_id, s.thread_id, v.embedding
            FROM stories s
            JOIN story_vectors v ON v.story_id = s.id
            ORDER BY s.position
            "#,
        )
        .fetch_all(&pool)
        .await?;

        let mut stories = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());

        for row in &rows {
            let tags_json: String = row.get("tags_json");
            let tags: Vec<String> = serde_json::from_str(&tags_json)?;
            let created_ts: i64 = row.get("created_at");
            let created_at = chrono::DateTime::from_timestamp(created_ts, 0)
                .ok_or_else(|| Error::Snapshot(format!("bad created_at: {}", created_ts)))?;

            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            if vector.len() != dims {
                let id: String = row.get("id");
                return Err(Error::Snapshot(format!(
                    "story {} has a {}-dim vector, snapshot records dims={}",
                    id,
                    vector.len(),
                    dims
                )));
            }

            stories.push(Story {
                id: row.get("id"),
                title: row.get("title"),
                body: row.get("body"),
                tags,
                author_id: row.get("author_id"),
                created_at,
                parent_id: row.get("parent_id"),
                thread_id: row.get("thread_id"),
            });
            vectors.push(vector);
        }

        pool.close().await;
        Self::new(stories, vectors, model_name, dims)
    }
}

/// Create the snapshot schema. Idempotent.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stories (
            id TEXT PRIMARY KEY,
            position INTEGER NOT NULL UNIQUE,
            title TEXT,
            body TEXT NOT NULL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            author_id TEXT,
            created_at INTEGER NOT NULL,
            parent_id TEXT,
            thread_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_vectors (
            story_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (story_id) REFERENCES stories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Open the snapshot database.
pub async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(Error::Storage)?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn read_meta(pool: &SqlitePool, key: &str) -> Result<String> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    value.ok_or_else(|| Error::Snapshot(format!("missing metadata key: {}", key)))
}
