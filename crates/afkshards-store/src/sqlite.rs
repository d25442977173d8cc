//! SQLite-backed store.
//!
//! Three tables, all keyed so every write is an idempotent upsert or a
//! delete:
//!
//! ```text
//! afk_status        uuid PK, is_afk, start_time (epoch ms)
//! afk_location      id PK (always 1), world, x, y, z
//! player_locations  uuid PK, world, x, y, z, yaw, pitch
//! ```

use std::path::Path;
use std::time::Duration;

use afkshards_types::{PlayerId, Position};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::{SessionRecord, SessionStore, StoreError};

/// Schema, applied on every connect.
pub(crate) const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS afk_status (
        uuid TEXT PRIMARY KEY NOT NULL,
        is_afk INTEGER NOT NULL DEFAULT 0,
        start_time INTEGER
    );

    CREATE TABLE IF NOT EXISTS afk_location (
        id INTEGER PRIMARY KEY,
        world TEXT NOT NULL,
        x REAL NOT NULL,
        y REAL NOT NULL,
        z REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS player_locations (
        uuid TEXT PRIMARY KEY NOT NULL,
        world TEXT NOT NULL,
        x REAL NOT NULL,
        y REAL NOT NULL,
        z REAL NOT NULL,
        yaw REAL NOT NULL,
        pitch REAL NOT NULL
    );
"#;

/// The single legacy location row.
const LOCATION_ROW_ID: i64 = 1;

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Opens (creating if needed) the database file at `path` and
    /// applies the schema.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "session store opened");
        Ok(store)
    }

    /// A private in-memory database. Single connection, since every
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, applying the schema.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(CREATE_TABLES_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Closes the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_session(row: &SqliteRow) -> Result<SessionRecord, StoreError> {
        let uuid: String = row.try_get("uuid")?;
        let millis: Option<i64> = row.try_get("start_time")?;
        let millis = millis.ok_or_else(|| {
            StoreError::CorruptRecord(format!("start_time missing for {uuid}"))
        })?;
        let started_at = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StoreError::CorruptRecord(format!("start_time {millis} out of range for {uuid}"))
        })?;
        Ok(SessionRecord {
            player: PlayerId::parse(&uuid)?,
            started_at,
        })
    }

    /// Drops an undecodable `afk_status` row so it can't fail every
    /// later startup too.
    async fn discard_corrupt_session(&self, row: &SqliteRow, error: &StoreError) {
        let Ok(uuid) = row.try_get::<String, _>("uuid") else {
            warn!(error = %error, "skipping unreadable session row");
            return;
        };
        warn!(%uuid, error = %error, "discarding corrupt session row");
        let deleted = sqlx::query("DELETE FROM afk_status WHERE uuid = ?")
            .bind(&uuid)
            .execute(&self.pool)
            .await;
        if let Err(e) = deleted {
            warn!(%uuid, error = %e, "failed to delete corrupt session row");
        }
    }

    fn row_to_position(row: &SqliteRow, with_rotation: bool) -> Result<Position, StoreError> {
        let position = Position::new(
            row.try_get::<String, _>("world")?,
            row.try_get("x")?,
            row.try_get("y")?,
            row.try_get("z")?,
        );
        let position = if with_rotation {
            let yaw: f64 = row.try_get("yaw")?;
            let pitch: f64 = row.try_get("pitch")?;
            position.with_rotation(yaw as f32, pitch as f32)
        } else {
            position
        };
        Ok(position.checked()?)
    }
}

impl SessionStore for SqliteSessionStore {
    async fn load_sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT uuid, start_time FROM afk_status WHERE is_afk = 1 ORDER BY uuid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::row_to_session(&row) {
                Ok(record) => sessions.push(record),
                Err(e) => self.discard_corrupt_session(&row, &e).await,
            }
        }
        Ok(sessions)
    }

    async fn persist_session(
        &self,
        player: PlayerId,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO afk_status (uuid, is_afk, start_time) VALUES (?, 1, ?)
            ON CONFLICT(uuid) DO UPDATE SET is_afk = excluded.is_afk, start_time = excluded.start_time
            "#,
        )
        .bind(player.to_string())
        .bind(started_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_session(&self, player: PlayerId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM afk_status WHERE uuid = ?")
            .bind(player.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_location(&self) -> Result<Option<Position>, StoreError> {
        let row = sqlx::query("SELECT world, x, y, z FROM afk_location WHERE id = ?")
            .bind(LOCATION_ROW_ID)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_position(&r, false)).transpose()
    }

    async fn persist_location(&self, location: Position) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO afk_location (id, world, x, y, z) VALUES (?, ?, ?, ?, ?)")
            .bind(LOCATION_ROW_ID)
            .bind(&location.world)
            .bind(location.x)
            .bind(location.y)
            .bind(location.z)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_location(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM afk_location WHERE id = ?")
            .bind(LOCATION_ROW_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_last_known_position(
        &self,
        player: PlayerId,
        position: Position,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO player_locations (uuid, world, x, y, z, yaw, pitch)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(player.to_string())
        .bind(&position.world)
        .bind(position.x)
        .bind(position.y)
        .bind(position.z)
        .bind(f64::from(position.yaw))
        .bind(f64::from(position.pitch))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_last_known_position(
        &self,
        player: PlayerId,
    ) -> Result<Option<Position>, StoreError> {
        let row = sqlx::query(
            "SELECT world, x, y, z, yaw, pitch FROM player_locations WHERE uuid = ?",
        )
        .bind(player.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_position(&r, true)).transpose()
    }
}
