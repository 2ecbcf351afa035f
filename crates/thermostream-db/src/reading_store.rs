//! `PostgreSQL`-backed [`ReadingStore`].
//!
//! Readings live in the append-only `readings` table. The source
//! timestamp is stored as `measured_at`; `received_at` is stamped by the
//! relay at insert time. Hourly aggregation truncates in UTC explicitly so
//! bucket keys never depend on the server's `TimeZone` setting.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thermostream_types::{
    HourlyBucket, NewReading, Reading, ReadingId, ReadingPage, ReadingStats,
};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{Paging, ReadingStore, check_range, hourly_window_start};

/// Operations on the `readings` table.
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    /// Open a pool for `config.database_url` and bring the schema up to
    /// date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed,
    /// [`StoreError::Postgres`] if no connection can be made, or
    /// [`StoreError::Migration`] if the schema cannot be migrated.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let options: PgConnectOptions = config
            .database_url
            .parse()
            .map_err(|e: sqlx::Error| StoreError::Config(format!("invalid database URL: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect_with(options)
            .await?;
        tracing::info!(
            max_connections = config.max_connections,
            "Reading store connected"
        );

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Reading store schema up to date");

        Ok(Self { pool })
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Reading store closed");
    }
}

impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: &NewReading) -> Result<Reading, StoreError> {
        let stored = Reading {
            id: ReadingId::new(),
            value: reading.value,
            timestamp: reading.timestamp,
            received_at: Utc::now(),
        };

        sqlx::query(
            r"INSERT INTO readings (id, value, measured_at, received_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(stored.id.into_inner())
        .bind(stored.value)
        .bind(stored.timestamp)
        .bind(stored.received_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(id = %stored.id, value = stored.value, "Inserted reading");
        Ok(stored)
    }

    async fn latest(&self, limit: u32) -> Result<Vec<Reading>, StoreError> {
        let rows = sqlx::query_as::<_, ReadingRow>(
            r"SELECT id, value, measured_at, received_at
              FROM readings
              ORDER BY measured_at DESC, received_at DESC
              LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }

    async fn range_ascending(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: u32,
        page_size: u32,
    ) -> Result<ReadingPage, StoreError> {
        check_range(start, end)?;
        let paging = Paging::new(page, page_size);

        let total: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM readings
              WHERE measured_at >= $1 AND measured_at <= $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReadingRow>(
            r"SELECT id, value, measured_at, received_at
              FROM readings
              WHERE measured_at >= $1 AND measured_at <= $2
              ORDER BY measured_at ASC, received_at ASC
              LIMIT $3 OFFSET $4",
        )
        .bind(start)
        .bind(end)
        .bind(i64::from(paging.page_size))
        .bind(i64::try_from(paging.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(ReadingPage {
            readings: rows.into_iter().map(Reading::from).collect(),
            total_count: u64::try_from(total).unwrap_or(0),
            page: paging.page,
            page_size: paging.page_size,
        })
    }

    async fn aggregate_all(&self) -> Result<ReadingStats, StoreError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r"SELECT COUNT(*) AS count,
                     MIN(value) AS min,
                     MAX(value) AS max,
                     AVG(value) AS avg,
                     MAX(measured_at) AS latest_timestamp
              FROM readings",
        )
        .fetch_one(&self.pool)
        .await?;

        if row.count == 0 {
            return Ok(ReadingStats::empty());
        }

        Ok(ReadingStats {
            count: u64::try_from(row.count).unwrap_or(0),
            min: row.min,
            max: row.max,
            avg: row.avg,
            latest_timestamp: row.latest_timestamp,
        })
    }

    async fn aggregate_hourly(&self, since_hours: u32) -> Result<Vec<HourlyBucket>, StoreError> {
        let since = hourly_window_start(Utc::now(), since_hours);

        let rows = sqlx::query_as::<_, HourlyRow>(
            r"SELECT date_trunc('hour', measured_at AT TIME ZONE 'UTC') AS hour,
                     AVG(value) AS avg,
                     COUNT(*) AS count
              FROM readings
              WHERE measured_at >= $1
              GROUP BY 1
              ORDER BY 1 ASC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HourlyBucket {
                hour: row.hour.and_utc(),
                avg: row.avg.unwrap_or(0.0),
                count: u64::try_from(row.count).unwrap_or(0),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A row from the `readings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ReadingRow {
    id: Uuid,
    value: f64,
    measured_at: DateTime<Utc>,
    received_at: DateTime<Utc>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Self {
            id: ReadingId::from(row.id),
            value: row.value,
            timestamp: row.measured_at,
            received_at: row.received_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    count: i64,
    min: Option<f64>,
    max: Option<f64>,
    avg: Option<f64>,
    latest_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct HourlyRow {
    hour: NaiveDateTime,
    avg: Option<f64>,
    count: i64,
}
