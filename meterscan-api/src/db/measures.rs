//! Measure database operations
//!
//! Translates between `measures` rows and [`Measure`] entities. Rows are
//! rebuilt through the validating constructor, so a row that violates the
//! entity invariants surfaces as [`StoreError::Corrupt`].

use chrono::{DateTime, SecondsFormat, Utc};
use meterscan_common::{Measure, MeasureType, NewMeasure};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT id, measure_uuid, customer_code, measure_datetime, measure_type,
           image_url, measure_value, has_confirmed
    FROM measures
"#;

/// Measure store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// UNIQUE(customer_code, measure_type, measure_month) violated
    #[error("Measure already recorded for {customer_code}/{measure_type} in {month}")]
    DuplicateMonth {
        customer_code: String,
        measure_type: String,
        month: String,
    },

    #[error("Duplicate measure identifier: {0}")]
    Duplicate(String),

    #[error("Measure not found: {0}")]
    NotFound(String),

    #[error("Measure already confirmed: {0}")]
    AlreadyConfirmed(String),

    #[error("Corrupt measure row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Partial update applied by [`MeasureRepository::update`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureUpdate {
    pub measure_value: Option<f64>,
    pub has_confirmed: Option<bool>,
}

/// Repository over the `measures` table
#[derive(Clone)]
pub struct MeasureRepository {
    pool: SqlitePool,
}

impl MeasureRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new measure
    pub async fn create(&self, measure: &Measure) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO measures (
                id, measure_uuid, customer_code, measure_datetime, measure_month,
                measure_type, image_url, measure_value, has_confirmed,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(measure.id().to_string())
        .bind(measure.measure_uuid())
        .bind(measure.customer_code())
        .bind(format_datetime(&measure.measure_datetime()))
        .bind(measure.month().key())
        .bind(measure.measure_type().as_str())
        .bind(measure.image_url())
        .bind(measure.measure_value())
        .bind(measure.has_confirmed())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    measure_uuid = %measure.measure_uuid(),
                    customer_code = %measure.customer_code(),
                    "Measure stored"
                );
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                if db_err.message().contains("measure_month") {
                    Err(StoreError::DuplicateMonth {
                        customer_code: measure.customer_code().to_string(),
                        measure_type: measure.measure_type().to_string(),
                        month: measure.month().key(),
                    })
                } else {
                    Err(StoreError::Duplicate(measure.measure_uuid().to_string()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load by internal row id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Measure>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(measure_from_row).transpose()
    }

    /// Load by public measure identifier
    pub async fn find_by_measure_uuid(&self, measure_uuid: &str) -> Result<Option<Measure>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE measure_uuid = ?", SELECT_COLUMNS))
            .bind(measure_uuid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(measure_from_row).transpose()
    }

    /// Apply a partial update; fields left `None` keep their stored value
    pub async fn update(&self, measure_uuid: &str, update: &MeasureUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE measures
            SET measure_value = COALESCE(?, measure_value),
                has_confirmed = COALESCE(?, has_confirmed),
                updated_at = CURRENT_TIMESTAMP
            WHERE measure_uuid = ?
            "#,
        )
        .bind(update.measure_value)
        .bind(update.has_confirmed)
        .bind(measure_uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(measure_uuid.to_string()));
        }
        Ok(())
    }

    /// Set the confirmed value of a reading that is not yet confirmed.
    ///
    /// The `has_confirmed = 0` guard makes the first writer win; later or
    /// concurrent confirms get [`StoreError::AlreadyConfirmed`].
    pub async fn confirm(&self, measure_uuid: &str, confirmed_value: f64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE measures
            SET measure_value = ?,
                has_confirmed = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE measure_uuid = ? AND has_confirmed = 0
            "#,
        )
        .bind(confirmed_value)
        .bind(measure_uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(measure_uuid = %measure_uuid, "Measure confirmed");
            return Ok(());
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM measures WHERE measure_uuid = ?")
            .bind(measure_uuid)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Err(StoreError::AlreadyConfirmed(measure_uuid.to_string())),
            None => Err(StoreError::NotFound(measure_uuid.to_string())),
        }
    }

    /// All measures for a customer and meter type, oldest first
    pub async fn find_by_customer_and_type(
        &self,
        customer_code: &str,
        measure_type: MeasureType,
    ) -> Result<Vec<Measure>, StoreError> {
        let rows = sqlx::query(&format!(
            "{} WHERE customer_code = ? AND measure_type = ? ORDER BY measure_datetime ASC",
            SELECT_COLUMNS
        ))
        .bind(customer_code)
        .bind(measure_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(measure_from_row).collect()
    }

    /// All measures for a customer, oldest first
    pub async fn find_by_customer(&self, customer_code: &str) -> Result<Vec<Measure>, StoreError> {
        let rows = sqlx::query(&format!(
            "{} WHERE customer_code = ? ORDER BY measure_datetime ASC",
            SELECT_COLUMNS
        ))
        .bind(customer_code)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(measure_from_row).collect()
    }

    /// Remove every measure. Test teardown and maintenance only.
    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM measures")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering and the
/// value round-trips exactly
fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn measure_from_row(row: &SqliteRow) -> Result<Measure, StoreError> {
    let id_str: String = row.try_get("id")?;
    let corrupt = |reason: String| StoreError::Corrupt {
        id: id_str.clone(),
        reason,
    };

    let id = Uuid::parse_str(&id_str).map_err(|e| corrupt(e.to_string()))?;

    let datetime_str: String = row.try_get("measure_datetime")?;
    let measure_datetime = DateTime::parse_from_rfc3339(&datetime_str)
        .map_err(|e| corrupt(format!("measure_datetime: {}", e)))?
        .with_timezone(&Utc);

    let type_str: String = row.try_get("measure_type")?;
    let measure_type: MeasureType = type_str.parse().map_err(|e| corrupt(format!("{}", e)))?;

    Measure::new(NewMeasure {
        id: Some(id),
        measure_uuid: Some(row.try_get("measure_uuid")?),
        customer_code: row.try_get("customer_code")?,
        measure_datetime,
        measure_type,
        image_url: row.try_get("image_url")?,
        measure_value: row.try_get("measure_value")?,
        has_confirmed: row.try_get("has_confirmed")?,
    })
    .map_err(|e| corrupt(e.to_string()))
}
