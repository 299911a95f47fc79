//! PostgreSQL store implementation
//!
//! One [`PostgresStore`] serves all three store traits over a shared pool.
//! Identities come from `BIGSERIAL` columns and ticker uniqueness from the
//! unique index on `symbols.ticker`.

pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Alert, AlertId, AlertType, NewAlert, NewPriceObservation, NewSymbol, PriceObservation, Symbol,
    SymbolId,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::traits::{AlertStore, PriceStore, SymbolStore};
use crate::{Result, StorageError};
use models::{AlertRow, PriceRow, SymbolRow};

const PRICE_COLUMNS: &str = r#"id, symbol_id, price, volume, moving_average_5, moving_average_20,
    percent_change, "timestamp", created_at"#;

const ALERT_COLUMNS: &str = r#"id, symbol_id, alert_type, message, trigger_value, threshold_value,
    is_read, "timestamp", created_at"#;

/// PostgreSQL-backed symbol, price and alert store
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect a new pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                StorageError::Connection(format!("Failed to connect to database: {}", e))
            })?;

        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the migration SQL to create tables
    pub async fn run_migrations(&self) -> Result<()> {
        let migration_sql = include_str!("../../../../migrations/001_create_stockgate.sql");
        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    async fn fetch_alerts(&self, sql: &str, bind: AlertFilter) -> Result<Vec<Alert>> {
        let query = sqlx::query_as::<_, AlertRow>(sql);
        let query = match bind {
            AlertFilter::None => query,
            AlertFilter::Since(since) => query.bind(since),
            AlertFilter::Symbol(id, limit) => query.bind(id).bind(limit),
            AlertFilter::Type(alert_type, limit) => query.bind(alert_type.as_str()).bind(limit),
        };

        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AlertRow::into_domain)
            .collect()
    }
}

enum AlertFilter {
    None,
    Since(DateTime<Utc>),
    Symbol(SymbolId, i64),
    Type(AlertType, i64),
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl SymbolStore for PostgresStore {
    async fn find_by_ticker(&self, ticker: &str) -> Result<Option<Symbol>> {
        let row = sqlx::query_as::<_, SymbolRow>("SELECT * FROM symbols WHERE ticker = $1")
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SymbolRow::into_domain).transpose()
    }

    async fn get(&self, id: SymbolId) -> Result<Option<Symbol>> {
        let row = sqlx::query_as::<_, SymbolRow>("SELECT * FROM symbols WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SymbolRow::into_domain).transpose()
    }

    #[instrument(skip(self, symbol), fields(ticker = %symbol.ticker))]
    async fn insert(&self, symbol: NewSymbol) -> Result<Symbol> {
        let row = sqlx::query_as::<_, SymbolRow>(
            r#"
            INSERT INTO symbols (ticker, name, asset_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (ticker) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&symbol.ticker)
        .bind(&symbol.name)
        .bind(symbol.asset_type.as_str())
        .bind(symbol.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                debug!(id = row.id, "Inserted symbol");
                row.into_domain()
            }
            None => Err(StorageError::Duplicate(format!(
                "Symbol already exists: {}",
                symbol.ticker
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<Symbol>> {
        sqlx::query_as::<_, SymbolRow>("SELECT * FROM symbols ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SymbolRow::into_domain)
            .collect()
    }
}

#[async_trait]
impl PriceStore for PostgresStore {
    async fn append(&self, observation: NewPriceObservation) -> Result<PriceObservation> {
        let sql = format!(
            r#"
            INSERT INTO price_history (
                symbol_id, price, volume, moving_average_5, moving_average_20,
                percent_change, "timestamp", created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PRICE_COLUMNS
        );

        let row = sqlx::query_as::<_, PriceRow>(&sql)
            .bind(observation.symbol_id)
            .bind(observation.price)
            .bind(observation.volume)
            .bind(observation.moving_average_5)
            .bind(observation.moving_average_20)
            .bind(observation.percent_change)
            .bind(observation.timestamp)
            .bind(observation.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn latest_all(&self) -> Result<Vec<PriceObservation>> {
        let sql = format!(
            r#"
            SELECT DISTINCT ON (symbol_id) {}
            FROM price_history
            ORDER BY symbol_id ASC, "timestamp" DESC, id DESC
            "#,
            PRICE_COLUMNS
        );

        let rows = sqlx::query_as::<_, PriceRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn latest(&self, symbol_id: SymbolId) -> Result<Option<PriceObservation>> {
        let sql = format!(
            r#"
            SELECT {} FROM price_history
            WHERE symbol_id = $1
            ORDER BY "timestamp" DESC, id DESC
            LIMIT 1
            "#,
            PRICE_COLUMNS
        );

        let row = sqlx::query_as::<_, PriceRow>(&sql)
            .bind(symbol_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn history(&self, symbol_id: SymbolId, limit: usize) -> Result<Vec<PriceObservation>> {
        let sql = format!(
            r#"
            SELECT {} FROM price_history
            WHERE symbol_id = $1
            ORDER BY "timestamp" DESC, id DESC
            LIMIT $2
            "#,
            PRICE_COLUMNS
        );

        let rows = sqlx::query_as::<_, PriceRow>(&sql)
            .bind(symbol_id)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn recent_since(
        &self,
        symbol_id: SymbolId,
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        let sql = format!(
            r#"
            SELECT {} FROM price_history
            WHERE symbol_id = $1 AND "timestamp" >= $2
            ORDER BY "timestamp" DESC, id DESC
            "#,
            PRICE_COLUMNS
        );

        let rows = sqlx::query_as::<_, PriceRow>(&sql)
            .bind(symbol_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl AlertStore for PostgresStore {
    async fn append(&self, alert: NewAlert) -> Result<Alert> {
        let sql = format!(
            r#"
            INSERT INTO alerts (
                symbol_id, alert_type, message, trigger_value, threshold_value,
                is_read, "timestamp", created_at
            ) VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        );

        sqlx::query_as::<_, AlertRow>(&sql)
            .bind(alert.symbol_id)
            .bind(alert.alert_type.as_str())
            .bind(&alert.message)
            .bind(alert.trigger_value)
            .bind(alert.threshold_value)
            .bind(alert.timestamp)
            .bind(alert.created_at)
            .fetch_one(&self.pool)
            .await?
            .into_domain()
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let sql = format!(
            r#"SELECT {} FROM alerts WHERE "timestamp" >= $1 ORDER BY "timestamp" DESC, id DESC"#,
            ALERT_COLUMNS
        );
        self.fetch_alerts(&sql, AlertFilter::Since(since)).await
    }

    async fn unread(&self) -> Result<Vec<Alert>> {
        let sql = format!(
            r#"SELECT {} FROM alerts WHERE is_read = FALSE ORDER BY "timestamp" DESC, id DESC"#,
            ALERT_COLUMNS
        );
        self.fetch_alerts(&sql, AlertFilter::None).await
    }

    async fn by_symbol(&self, symbol_id: SymbolId, limit: usize) -> Result<Vec<Alert>> {
        let sql = format!(
            r#"SELECT {} FROM alerts WHERE symbol_id = $1
               ORDER BY "timestamp" DESC, id DESC LIMIT $2"#,
            ALERT_COLUMNS
        );
        self.fetch_alerts(&sql, AlertFilter::Symbol(symbol_id, limit_param(limit)))
            .await
    }

    async fn by_type(&self, alert_type: AlertType, limit: usize) -> Result<Vec<Alert>> {
        let sql = format!(
            r#"SELECT {} FROM alerts WHERE alert_type = $1
               ORDER BY "timestamp" DESC, id DESC LIMIT $2"#,
            ALERT_COLUMNS
        );
        self.fetch_alerts(&sql, AlertFilter::Type(alert_type, limit_param(limit)))
            .await
    }

    async fn mark_read(&self, id: AlertId) -> Result<bool> {
        let result = sqlx::query("UPDATE alerts SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE alerts SET is_read = TRUE WHERE is_read = FALSE")
            .execute(&self.pool)
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            info!("Marked {} alerts as read", count);
        }
        Ok(count)
    }

    async fn unread_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE is_read = FALSE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
