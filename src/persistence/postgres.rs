use super::{ReadingStore, StoreError};
use crate::telemetry::Reading;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sensor_data (
    id BIGSERIAL PRIMARY KEY,
    temperature DOUBLE PRECISION NOT NULL,
    humidity DOUBLE PRECISION NOT NULL,
    gm DOUBLE PRECISION NOT NULL,
    co2 DOUBLE PRECISION NOT NULL,
    vol DOUBLE PRECISION NOT NULL,
    tm DOUBLE PRECISION NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL
)";

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS sensor_data_timestamp_idx ON sensor_data (timestamp DESC)";

const INSERT_READING: &str = "INSERT INTO sensor_data (temperature, humidity, gm, co2, vol, tm, timestamp)
     VALUES ($1, $2, $3, $4, $5, $6, $7)";

const SELECT_RECENT: &str = "SELECT temperature, humidity, gm, co2, vol, tm, timestamp
     FROM sensor_data ORDER BY timestamp DESC LIMIT $1";

/// PostgreSQL client wrapper with connection pooling
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a pooled client. No connection is opened until first use.
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
        max_pool_size: usize,
    ) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(host.to_string());
        cfg.port = Some(port);
        cfg.dbname = Some(database.to_string());
        cfg.user = Some(username.to_string());
        cfg.password = Some(password.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        pool.resize(max_pool_size);

        Ok(Self { pool })
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.get_connection().await?;
        client
            .execute("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

/// [`ReadingStore`] backed by the `sensor_data` table.
#[derive(Clone)]
pub struct PostgresReadingStore {
    client: PostgresClient,
}

impl PostgresReadingStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    /// Creates `sensor_data` and its timestamp index when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute(&format!("{CREATE_TABLE};\n{CREATE_INDEX};"))
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        info!("sensor_data schema ready");
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for PostgresReadingStore {
    async fn append(&self, reading: &Reading) -> Result<(), StoreError> {
        let conn = self.client.get_connection().await?;

        conn.execute(
            INSERT_READING,
            &[
                &reading.temperature,
                &reading.humidity,
                &reading.gm,
                &reading.co2,
                &reading.vol,
                &reading.tm,
                &reading.timestamp,
            ],
        )
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        debug!(timestamp = %reading.timestamp, "reading inserted");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let conn = self.client.get_connection().await?;

        let rows = conn
            .query(SELECT_RECENT, &[&limit_param(limit)])
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter().map(reading_from_row).collect()
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn reading_from_row(row: &Row) -> Result<Reading, StoreError> {
    let column = |name: &str| -> Result<f64, StoreError> {
        row.try_get(name)
            .map_err(|e| StoreError::Query(format!("column {name}: {e}")))
    };
    let timestamp: DateTime<Utc> = row
        .try_get("timestamp")
        .map_err(|e| StoreError::Query(format!("column timestamp: {e}")))?;

    Ok(Reading {
        temperature: column("temperature")?,
        humidity: column("humidity")?,
        gm: column("gm")?,
        co2: column("co2")?,
        vol: column("vol")?,
        tm: column("tm")?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_param_saturates() {
        assert_eq!(limit_param(15), 15);
        assert_eq!(limit_param(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_insert_binds_every_reading_column() {
        for column in ["temperature", "humidity", "gm", "co2", "vol", "tm", "timestamp"] {
            assert!(INSERT_READING.contains(column));
            assert!(SELECT_RECENT.contains(column));
        }
        assert!(INSERT_READING.contains("$7"));
        assert!(SELECT_RECENT.contains("ORDER BY timestamp DESC"));
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() {
        let client = PostgresClient::new("localhost", 5432, "data_compass", "postgres", "", 4);
        assert!(client.is_ok());
    }
}
