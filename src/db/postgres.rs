use crate::config::DatabaseConfig;
use crate::db::database::MetadataStore;
use crate::db::error::DatabaseError;
use crate::db::models::{ArtifactRecord, NewArtifactRecord, RecordPage};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, error, info};

const TABLE: &str = "artifact_versions";
const COLUMNS: &str = "id, model_name, version, s3_key, file_size, created_at";

/// A PostgreSQL implementation of the MetadataStore trait
pub struct PostgresDatabase {
    pool: PgPool,
    schema: Option<String>,
}

impl PostgresDatabase {
    /// Connect using the given configuration and make sure the table exists
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if let Some(schema) = &config.schema {
            if !is_valid_identifier(schema) {
                return Err(DatabaseError::ConnectionError(format!(
                    "Invalid schema name: {}",
                    schema
                )));
            }
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(60))
            .connect_lazy(&config.url)
            .map_err(|e| {
                error!("Failed to create connection pool: {}", e);
                DatabaseError::ConnectionError(e.to_string())
            })?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            error!("Database connectivity test failed: {}", e);
            return Err(DatabaseError::ConnectionError(format!(
                "Database is not accessible: {}",
                e
            )));
        };

        let db = PostgresDatabase {
            pool,
            schema: config.schema.clone(),
        };
        db.initialize_schema().await?;

        info!("PostgreSQL database connection established successfully");
        Ok(db)
    }

    /// Create the schema (when configured), the table and its indexes
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        if let Some(schema_name) = &self.schema {
            info!("Initializing schema: {}", schema_name);
            let create_schema_query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema_name);
            self.execute_ddl(&create_schema_query, "create schema").await?;
        }

        let table = self.table_name();
        let create_table_query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                model_name VARCHAR(255) NOT NULL,
                version VARCHAR(255),
                s3_key VARCHAR(1024) NOT NULL UNIQUE,
                file_size BIGINT NOT NULL CHECK (file_size >= 0),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            table
        );
        self.execute_ddl(&create_table_query, "create table").await?;

        let created_at_index = format!(
            "CREATE INDEX IF NOT EXISTS {}_created_at_idx ON {} (created_at DESC, id ASC)",
            TABLE, table
        );
        self.execute_ddl(&created_at_index, "create created_at index")
            .await?;

        let model_name_index = format!(
            "CREATE INDEX IF NOT EXISTS {}_model_name_idx ON {} (model_name)",
            TABLE, table
        );
        self.execute_ddl(&model_name_index, "create model_name index")
            .await?;

        debug!("Table {} is ready", table);
        Ok(())
    }

    async fn execute_ddl(&self, query: &str, what: &str) -> Result<(), DatabaseError> {
        debug!("Executing: {}", query.trim());
        sqlx::query(query).execute(&self.pool).await.map_err(|e| {
            error!("Failed to {}: {}", what, e);
            DatabaseError::QueryError(format!("Failed to {}: {}", what, e))
        })?;
        Ok(())
    }

    /// Get the table name with schema prefix if applicable
    fn table_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, TABLE),
            None => TABLE.to_string(),
        }
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn record_from_row(row: &PgRow) -> Result<ArtifactRecord, DatabaseError> {
    let map = |e: sqlx::Error| DatabaseError::DeserializationError(e.to_string());
    Ok(ArtifactRecord {
        id: row.try_get("id").map_err(map)?,
        model_name: row.try_get("model_name").map_err(map)?,
        version: row.try_get("version").map_err(map)?,
        storage_key: row.try_get("s3_key").map_err(map)?,
        file_size_bytes: row.try_get("file_size").map_err(map)?,
        created_at: row.try_get("created_at").map_err(map)?,
    })
}

/// Translate a driver error, separating retryable outages from query bugs
fn map_sqlx_error(context: &str, e: sqlx::Error) -> DatabaseError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DatabaseError::Conflict(format!("{}: {}", context, db_err.message()))
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => {
            error!("{}: database unavailable: {}", context, e);
            DatabaseError::Unavailable(format!("{}: {}", context, e))
        }
        _ => {
            error!("{}: {}", context, e);
            DatabaseError::QueryError(format!("{}: {}", context, e))
        }
    }
}

#[async_trait]
impl MetadataStore for PostgresDatabase {
    async fn insert_record(
        &self,
        record: NewArtifactRecord,
    ) -> Result<ArtifactRecord, DatabaseError> {
        debug!(
            "Inserting record: model_name={}, version={:?}, key={}",
            record.model_name, record.version, record.storage_key
        );

        let query = format!(
            "INSERT INTO {} (model_name, version, s3_key, file_size) VALUES ($1, $2, $3, $4) RETURNING {}",
            self.table_name(),
            COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(&record.model_name)
            .bind(&record.version)
            .bind(&record.storage_key)
            .bind(record.file_size_bytes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to insert record", e))?;

        let inserted = record_from_row(&row)?;
        info!(
            "Inserted record {} for key {}",
            inserted.id, inserted.storage_key
        );
        Ok(inserted)
    }

    async fn get_record(&self, id: i64) -> Result<Option<ArtifactRecord>, DatabaseError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, self.table_name());

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch record", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn get_record_by_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<ArtifactRecord>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM {} WHERE s3_key = $1",
            COLUMNS,
            self.table_name()
        );

        let row = sqlx::query(&query)
            .bind(storage_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch record by key", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn get_records_by_name(
        &self,
        model_name: &str,
    ) -> Result<Vec<ArtifactRecord>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM {} WHERE model_name = $1 ORDER BY created_at ASC, id ASC",
            COLUMNS,
            self.table_name()
        );

        let rows = sqlx::query(&query)
            .bind(model_name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch records by name", e))?;

        debug!("Found {} records for model {}", rows.len(), model_name);
        rows.iter().map(record_from_row).collect()
    }

    async fn delete_record(&self, id: i64) -> Result<(), DatabaseError> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name());

        let result = sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to delete record", e))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::RecordNotFound(id));
        }

        info!("Deleted record {}", id);
        Ok(())
    }

    async fn get_page(&self, offset: u64, limit: u64) -> Result<RecordPage, DatabaseError> {
        debug!("Querying page with offset={}, limit={}", offset, limit);

        let offset = i64::try_from(offset)
            .map_err(|_| DatabaseError::QueryError(format!("Offset {} out of range", offset)))?;
        let limit = i64::try_from(limit)
            .map_err(|_| DatabaseError::QueryError(format!("Limit {} out of range", limit)))?;

        // Items and count come from one snapshot so totals match the page
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to set isolation level", e))?;

        let page_query = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2",
            COLUMNS,
            self.table_name()
        );
        let rows = sqlx::query(&page_query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to fetch page", e))?;

        let count_query = format!("SELECT COUNT(*) FROM {}", self.table_name());
        let total: i64 = sqlx::query_scalar(&count_query)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to count records", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transaction", e))?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecordPage {
            records,
            total_count: u64::try_from(total).unwrap_or(0),
        })
    }
}
