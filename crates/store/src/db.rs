//! SQLite database for price history and alert audit.

use crate::record::{AlertRecord, StoreStats};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures_util::{Stream, StreamExt};
use pricewatch_core::{
    Availability, Currency, Price, PriceObservation, ProductId, RecordId, StoredObservation,
    ValidationError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid observation: {0}")]
    Validation(#[from] ValidationError),
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("Observation for {product} at {observed_at} predates the latest stored one ({latest})")]
    OutOfOrder {
        product: ProductId,
        observed_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

/// The two most recent observations of a product, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestPair {
    pub latest: Option<StoredObservation>,
    pub previous: Option<StoredObservation>,
}

/// Timestamps are stored as fixed-width RFC 3339 text so that string order
/// matches time order.
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_ts(id: i64, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            id,
            reason: format!("timestamp {raw:?}: {e}"),
        })
}

#[derive(Debug, FromRow)]
struct ObservationRow {
    id: i64,
    retailer: String,
    product_url: String,
    product_name: String,
    category: String,
    observed_at: String,
    current_price: i64,
    original_price: Option<i64>,
    currency: String,
    availability: String,
    raw_payload: String,
}

impl ObservationRow {
    fn into_stored(self) -> Result<StoredObservation, StorageError> {
        let id = self.id;
        let corrupt = |reason: String| StorageError::Corrupt { id, reason };

        let product =
            ProductId::new(&self.retailer, &self.product_url).map_err(|e| corrupt(e.to_string()))?;
        let current_price =
            Price::from_raw(self.current_price).map_err(|e| corrupt(e.to_string()))?;
        let original_price = self
            .original_price
            .map(Price::from_raw)
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?;
        let currency = Currency::new(&self.currency).map_err(|e| corrupt(e.to_string()))?;
        let availability = self
            .availability
            .parse::<Availability>()
            .map_err(|e| corrupt(e.to_string()))?;
        let raw_payload = serde_json::from_str(&self.raw_payload)
            .map_err(|e| corrupt(format!("raw payload: {e}")))?;
        let observed_at = decode_ts(id, &self.observed_at)?;

        Ok(StoredObservation {
            id: RecordId(id),
            observation: PriceObservation {
                product,
                product_name: self.product_name,
                category: self.category,
                observed_at,
                current_price,
                original_price,
                currency,
                availability,
                raw_payload,
            },
        })
    }
}

/// Handle on the price history database.
///
/// Holds a single connection: the monitor is the only writer and runs its
/// steps sequentially.
#[derive(Clone)]
pub struct PriceStore {
    pool: SqlitePool,
}

impl PriceStore {
    /// Connect using a SQLite URL such as `sqlite::memory:` or `sqlite://data/prices.db`.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::connect_with(options).await
    }

    /// Open (or create) the database file at `path`, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::connect_with(options).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Close the connection, flushing the WAL.
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Price store closed");
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                retailer TEXT NOT NULL,
                product_url TEXT NOT NULL,
                product_name TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                observed_at TEXT NOT NULL,
                current_price INTEGER NOT NULL CHECK (current_price >= 0),
                original_price INTEGER CHECK (original_price IS NULL OR original_price >= 0),
                currency TEXT NOT NULL,
                availability TEXT NOT NULL DEFAULT 'unknown',
                raw_payload TEXT NOT NULL DEFAULT 'null',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_price_history_product
            ON price_history(retailer, product_url, observed_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_price_history_category ON price_history(category)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                retailer TEXT NOT NULL,
                product_url TEXT NOT NULL,
                product_name TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                old_price REAL,
                new_price REAL,
                pct_change REAL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_price_alerts_created ON price_alerts(created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append an observation. Rejects invalid values and observations older
    /// than the newest one already stored for the product.
    pub async fn record(&self, observation: &PriceObservation) -> Result<RecordId, StorageError> {
        observation.validate()?;

        let newest = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT id, observed_at FROM price_history
            WHERE retailer = ? AND product_url = ?
            ORDER BY observed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(observation.product.retailer.as_str())
        .bind(&observation.product.url)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((id, raw)) = newest {
            let latest = decode_ts(id, &raw)?;
            if observation.observed_at < latest {
                return Err(StorageError::OutOfOrder {
                    product: observation.product.clone(),
                    observed_at: observation.observed_at,
                    latest,
                });
            }
        }

        let result = sqlx::query(
            r#"
            INSERT INTO price_history
                (retailer, product_url, product_name, category, observed_at,
                 current_price, original_price, currency, availability, raw_payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(observation.product.retailer.as_str())
        .bind(&observation.product.url)
        .bind(&observation.product_name)
        .bind(&observation.category)
        .bind(encode_ts(&observation.observed_at))
        .bind(observation.current_price.to_storage())
        .bind(observation.original_price.map(Price::to_storage))
        .bind(observation.currency.as_str())
        .bind(observation.availability.as_str())
        .bind(observation.raw_payload.to_string())
        .execute(&self.pool)
        .await?;

        let id = RecordId(result.last_insert_rowid());
        debug!(
            id = id.0,
            product = %observation.product,
            price = %observation.current_price,
            "Recorded observation"
        );
        Ok(id)
    }

    /// Most recent and second-most-recent observation of `product`.
    /// Equal timestamps are ordered by record id.
    pub async fn latest_two(&self, product: &ProductId) -> Result<LatestPair, StorageError> {
        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT id, retailer, product_url, product_name, category, observed_at,
                   current_price, original_price, currency, availability, raw_payload
            FROM price_history
            WHERE retailer = ? AND product_url = ?
            ORDER BY observed_at DESC, id DESC
            LIMIT 2
            "#,
        )
        .bind(product.retailer.as_str())
        .bind(&product.url)
        .fetch_all(&self.pool)
        .await?;

        let mut rows = rows.into_iter();
        let latest = rows.next().map(ObservationRow::into_stored).transpose()?;
        let previous = rows.next().map(ObservationRow::into_stored).transpose()?;
        Ok(LatestPair { latest, previous })
    }

    /// Observations of `product` in ascending time order, optionally from
    /// `since` onwards. Rows are decoded lazily; call again to restart.
    pub fn history<'a>(
        &'a self,
        product: &'a ProductId,
        since: Option<DateTime<Utc>>,
    ) -> impl Stream<Item = Result<StoredObservation, StorageError>> + 'a {
        let since = since.as_ref().map(encode_ts);
        sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT id, retailer, product_url, product_name, category, observed_at,
                   current_price, original_price, currency, availability, raw_payload
            FROM price_history
            WHERE retailer = ? AND product_url = ?
              AND (? IS NULL OR observed_at >= ?)
            ORDER BY observed_at ASC, id ASC
            "#,
        )
        .bind(product.retailer.as_str())
        .bind(product.url.as_str())
        .bind(since.clone())
        .bind(since)
        .fetch(&self.pool)
        .map(|row| row.map_err(StorageError::from).and_then(ObservationRow::into_stored))
    }

    /// Every product that has at least one observation.
    pub async fn products(&self) -> Result<Vec<ProductId>, StorageError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT DISTINCT retailer, product_url FROM price_history
            ORDER BY retailer, product_url
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(retailer, url)| ProductId::new(&retailer, &url).map_err(StorageError::from))
            .collect()
    }

    /// Newest observation of every product, optionally limited to one category.
    pub async fn latest_by_retailer(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<StoredObservation>, StorageError> {
        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT id, retailer, product_url, product_name, category, observed_at,
                   current_price, original_price, currency, availability, raw_payload
            FROM (
                SELECT *, ROW_NUMBER() OVER (
                    PARTITION BY retailer, product_url
                    ORDER BY observed_at DESC, id DESC
                ) AS rn
                FROM price_history
            )
            WHERE rn = 1 AND (? IS NULL OR category = ?)
            ORDER BY product_name, retailer
            "#,
        )
        .bind(category)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ObservationRow::into_stored).collect()
    }

    /// Record an alert in the audit table.
    pub async fn record_alert(&self, alert: &AlertRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO price_alerts
                (retailer, product_url, product_name, alert_type, severity,
                 old_price, new_price, pct_change, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&alert.retailer)
        .bind(&alert.product_url)
        .bind(&alert.product_name)
        .bind(&alert.alert_type)
        .bind(&alert.severity)
        .bind(alert.old_price)
        .bind(alert.new_price)
        .bind(alert.pct_change)
        .bind(&alert.message)
        .bind(encode_ts(&alert.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Summary counts over the whole history.
    pub async fn stats(&self) -> Result<StoreStats, StorageError> {
        let total_records =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM price_history")
                .fetch_one(&self.pool)
                .await?;

        let unique_products = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM (SELECT DISTINCT retailer, product_url FROM price_history)",
        )
        .fetch_one(&self.pool)
        .await?;

        let retailers_tracked =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT retailer) FROM price_history")
                .fetch_one(&self.pool)
                .await?;

        let (earliest, latest) = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            "SELECT MIN(observed_at), MAX(observed_at) FROM price_history",
        )
        .fetch_one(&self.pool)
        .await?;

        let cutoff = encode_ts(&(Utc::now() - Duration::hours(24)));
        let alerts_24h =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM price_alerts WHERE created_at >= ?")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?;

        let stats = StoreStats {
            total_records,
            unique_products,
            retailers_tracked,
            earliest_observation: earliest.as_deref().map(|raw| decode_ts(0, raw)).transpose()?,
            latest_observation: latest.as_deref().map(|raw| decode_ts(0, raw)).transpose()?,
            alerts_24h,
        };
        info!(
            total_records = stats.total_records,
            unique_products = stats.unique_products,
            "Loaded store statistics"
        );
        Ok(stats)
    }
}
