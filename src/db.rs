//! SQLite storage for devices and condition rows.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tokio_stream::StreamExt;

use crate::classify::ConditionLevel;
use crate::constants::EXPECTED_DB_VERSION;
use crate::models::{ConditionRow, Device, NewCondition};
use crate::queries::{conditions, ddl, devices, metadata};
use crate::validity::DeviceRegistry;

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Rows per INSERT statement when flushing a large batch
const INSERT_CHUNK_ROWS: usize = 1000;

/// Open a file-based pool, creating the file and parent directory if missing
/// Enables WAL mode and foreign keys
pub async fn open_database(db_path: &Path, max_connections: u32) -> Result<SqlitePool, DynError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory '{}': {}", parent.display(), e))?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create tables and indexes, then record or verify the schema version
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), DynError> {
    sqlx::query(&ddl::create_metadata_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_isu_table()).execute(pool).await?;
    sqlx::query(&ddl::create_isu_condition_table())
        .execute(pool)
        .await?;

    sqlx::query(&ddl::create_isu_condition_uuid_timestamp_index())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_isu_character_index())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_isu_user_index())
        .execute(pool)
        .await?;

    match query_metadata(pool, "version").await? {
        Some(version) if version != EXPECTED_DB_VERSION => Err(format!(
            "Unsupported database version: '{}'. This application only supports version '{}'",
            version, EXPECTED_DB_VERSION
        )
        .into()),
        Some(_) => Ok(()),
        None => {
            sqlx::query(&metadata::insert("version", EXPECTED_DB_VERSION))
                .execute(pool)
                .await?;
            Ok(())
        }
    }
}

/// Query a single metadata value by key
pub async fn query_metadata(pool: &SqlitePool, key: &str) -> Result<Option<String>, DynError> {
    let row = sqlx::query(&metadata::select_by_key(key))
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get::<String, _>(0)))
}

/// Create a pool backed by a file in a fresh temporary directory
/// Keep the returned guard alive for as long as the pool is used
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), DynError> {
    let dir = tempfile::tempdir()?;
    let pool = open_database(&dir.path().join("test.sqlite"), 4).await?;
    Ok((pool, dir))
}

/// Storage collaborator used by ingestion, flushing and the read paths
#[derive(Clone)]
pub struct ConditionStore {
    pool: SqlitePool,
}

impl ConditionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a drained batch in one transaction
    ///
    /// Either every row is committed or none is.
    pub async fn insert_conditions(&self, batch: &[NewCondition]) -> Result<u64, sqlx::Error> {
        if batch.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in batch.chunks(INSERT_CHUNK_ROWS) {
            if let Some(sql) = conditions::insert_batch(chunk, created_at) {
                inserted += sqlx::query(&sql).execute(&mut *tx).await?.rows_affected();
            }
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// Conditions of one device newest first, filtered by window and level
    pub async fn select_conditions(
        &self,
        jia_isu_uuid: &str,
        end_time: i64,
        start_time: Option<i64>,
        levels: &[ConditionLevel],
        limit: u32,
    ) -> Result<Vec<ConditionRow>, sqlx::Error> {
        let sql = conditions::select_page(jia_isu_uuid, end_time, start_time, levels, limit);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(ConditionRow::from_row).collect()
    }

    /// Visit every condition of one device oldest first
    ///
    /// Rows are decoded one at a time as they arrive from the cursor; the
    /// scan stops at the first error returned by `visit`.
    pub async fn stream_conditions_asc<E, F>(&self, jia_isu_uuid: &str, mut visit: F) -> Result<(), E>
    where
        E: From<sqlx::Error>,
        F: FnMut(ConditionRow) -> Result<(), E>,
    {
        let sql = conditions::select_all_ascending(jia_isu_uuid);
        let mut rows = sqlx::query(&sql).fetch(&self.pool);
        while let Some(row) = rows.next().await {
            visit(ConditionRow::from_row(&row?)?)?;
        }
        Ok(())
    }

    /// Most recent condition of one device, if any
    pub async fn latest_condition(
        &self,
        jia_isu_uuid: &str,
    ) -> Result<Option<ConditionRow>, sqlx::Error> {
        let sql = conditions::select_latest(jia_isu_uuid);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(ConditionRow::from_row).transpose()
    }

    pub async fn count_conditions(&self, jia_isu_uuid: &str) -> Result<i64, sqlx::Error> {
        let sql = conditions::count_for_device(jia_isu_uuid);
        sqlx::query_scalar(&sql).fetch_one(&self.pool).await
    }

    /// Distinct device categories
    pub async fn select_characters(&self) -> Result<Vec<String>, sqlx::Error> {
        let sql = devices::select_characters();
        sqlx::query_scalar(&sql).fetch_all(&self.pool).await
    }

    /// (id, jia_isu_uuid) of every device in a category
    pub async fn select_devices_by_character(
        &self,
        character: &str,
    ) -> Result<Vec<(i64, String)>, sqlx::Error> {
        let sql = devices::select_by_character(character);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<(i64, String), sqlx::Error> {
                Ok((row.try_get("id")?, row.try_get("jia_isu_uuid")?))
            })
            .collect()
    }

    /// A device if it is owned by the given user
    pub async fn select_device_for_user(
        &self,
        jia_isu_uuid: &str,
        jia_user_id: &str,
    ) -> Result<Option<Device>, sqlx::Error> {
        let sql = devices::select_for_user(jia_isu_uuid, jia_user_id);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(Device::from_row).transpose()
    }

    /// Every device owned by the given user, newest registration first
    pub async fn select_devices_for_user(
        &self,
        jia_user_id: &str,
    ) -> Result<Vec<Device>, sqlx::Error> {
        let sql = devices::select_all_for_user(jia_user_id);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Device::from_row).collect()
    }

    /// Insert a device row as the registration service would
    pub async fn insert_device(
        &self,
        jia_isu_uuid: &str,
        name: &str,
        character: &str,
        jia_user_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        let sql = devices::insert(jia_isu_uuid, name, character, jia_user_id, now);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        Ok(result.last_insert_rowid())
    }
}

impl DeviceRegistry for ConditionStore {
    async fn device_exists(&self, jia_isu_uuid: &str) -> Result<bool, sqlx::Error> {
        let sql = devices::select_id_by_uuid(jia_isu_uuid);
        let id: Option<i64> = sqlx::query_scalar(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id.is_some())
    }
}
