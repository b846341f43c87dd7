//! SQLite scorecard repository implementation.
//!
//! Scorecards, characteristics and attributes live in three tables joined by
//! cascading foreign keys. Reads assemble the full tree.

use chrono::{DateTime, Utc};
use creditflow_core::repository::scorecard::ScorecardRepository;
use creditflow_types::error::RepositoryError;
use creditflow_types::scorecard::{
    Attribute, BinCounts, BinSpec, Characteristic, Scorecard, ScorecardStatus,
};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ScorecardRepository`.
#[derive(Clone)]
pub struct SqliteScorecardRepository {
    pool: DatabasePool,
}

impl SqliteScorecardRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn characteristics_of(
        &self,
        scorecard_id: &Uuid,
    ) -> Result<Vec<Characteristic>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM characteristics WHERE scorecard_id = ? ORDER BY display_order ASC, id ASC",
        )
        .bind(scorecard_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut characteristics = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut characteristic = row_to_characteristic(row)?;
            characteristic.attributes = self.attributes_of(&characteristic.id).await?;
            characteristics.push(characteristic);
        }
        Ok(characteristics)
    }

    async fn attributes_of(&self, characteristic_id: &Uuid) -> Result<Vec<Attribute>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM attributes WHERE characteristic_id = ? ORDER BY id ASC")
            .bind(characteristic_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_attribute).collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_scorecard(row: &sqlx::sqlite::SqliteRow) -> Result<Scorecard, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let created_at: String = row.try_get("created_at").map_err(get)?;
    let updated_at: String = row.try_get("updated_at").map_err(get)?;

    Ok(Scorecard {
        id: parse_uuid(&id)?,
        name: row.try_get("name").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        base_score: row.try_get("base_score").map_err(get)?,
        pdo: row.try_get("pdo").map_err(get)?,
        base_odds: row.try_get("base_odds").map_err(get)?,
        status: status.parse::<ScorecardStatus>().map_err(RepositoryError::Query)?,
        characteristics: Vec::new(),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn row_to_characteristic(row: &sqlx::sqlite::SqliteRow) -> Result<Characteristic, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(get)?;
    let scorecard_id: String = row.try_get("scorecard_id").map_err(get)?;

    Ok(Characteristic {
        id: parse_uuid(&id)?,
        scorecard_id: parse_uuid(&scorecard_id)?,
        name: row.try_get("name").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        weight: row.try_get("weight").map_err(get)?,
        order: row.try_get("display_order").map_err(get)?,
        attributes: Vec::new(),
    })
}

fn row_to_attribute(row: &sqlx::sqlite::SqliteRow) -> Result<Attribute, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());

    let id: String = row.try_get("id").map_err(get)?;
    let characteristic_id: String = row.try_get("characteristic_id").map_err(get)?;
    let bin = BinSpec {
        min_value: row.try_get("min_value").map_err(get)?,
        max_value: row.try_get("max_value").map_err(get)?,
        category: row.try_get("category").map_err(get)?,
    }
    .into_bin()
    .map_err(|e| RepositoryError::Query(format!("invalid attribute {id}: {e}")))?;
    let count = |column: &str| -> Result<u64, RepositoryError> {
        let value: i64 = row.try_get(column).map_err(get)?;
        Ok(value.max(0) as u64)
    };

    Ok(Attribute {
        id: parse_uuid(&id)?,
        characteristic_id: parse_uuid(&characteristic_id)?,
        label: row.try_get("label").map_err(get)?,
        bin,
        counts: BinCounts {
            good_count: count("good_count")?,
            bad_count: count("bad_count")?,
            total_good: count("total_good")?,
            total_bad: count("total_bad")?,
        },
    })
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Conflict(db.message().to_string()),
        _ => RepositoryError::Query(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// ScorecardRepository impl
// ---------------------------------------------------------------------------

impl ScorecardRepository for SqliteScorecardRepository {
    async fn save_scorecard(&self, scorecard: &Scorecard) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO scorecards
               (id, name, description, base_score, pdo, base_odds, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 base_score = excluded.base_score,
                 pdo = excluded.pdo,
                 base_odds = excluded.base_odds,
                 status = excluded.status,
                 updated_at = excluded.updated_at"#,
        )
        .bind(scorecard.id.to_string())
        .bind(&scorecard.name)
        .bind(&scorecard.description)
        .bind(scorecard.base_score)
        .bind(scorecard.pdo)
        .bind(scorecard.base_odds)
        .bind(scorecard.status.to_string())
        .bind(format_datetime(&scorecard.created_at))
        .bind(format_datetime(&scorecard.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_scorecard(&self, id: &Uuid) -> Result<Option<Scorecard>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM scorecards WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let mut scorecard = row_to_scorecard(&row)?;
                scorecard.characteristics = self.characteristics_of(&scorecard.id).await?;
                Ok(Some(scorecard))
            }
            None => Ok(None),
        }
    }

    async fn list_scorecards(&self) -> Result<Vec<Scorecard>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM scorecards ORDER BY created_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut scorecards = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut scorecard = row_to_scorecard(row)?;
            scorecard.characteristics = self.characteristics_of(&scorecard.id).await?;
            scorecards.push(scorecard);
        }
        Ok(scorecards)
    }

    async fn delete_scorecard(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM scorecards WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_characteristic(
        &self,
        characteristic: &Characteristic,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO characteristics (id, scorecard_id, name, description, weight, display_order)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 weight = excluded.weight,
                 display_order = excluded.display_order"#,
        )
        .bind(characteristic.id.to_string())
        .bind(characteristic.scorecard_id.to_string())
        .bind(&characteristic.name)
        .bind(&characteristic.description)
        .bind(characteristic.weight)
        .bind(characteristic.order)
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_characteristic(
        &self,
        id: &Uuid,
    ) -> Result<Option<Characteristic>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM characteristics WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let mut characteristic = row_to_characteristic(&row)?;
                characteristic.attributes = self.attributes_of(&characteristic.id).await?;
                Ok(Some(characteristic))
            }
            None => Ok(None),
        }
    }

    async fn delete_characteristic(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM characteristics WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_attribute(&self, attribute: &Attribute) -> Result<(), RepositoryError> {
        let bin = BinSpec::from(attribute.bin.clone());

        sqlx::query(
            r#"INSERT INTO attributes
               (id, characteristic_id, label, min_value, max_value, category,
                good_count, bad_count, total_good, total_bad)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 label = excluded.label,
                 min_value = excluded.min_value,
                 max_value = excluded.max_value,
                 category = excluded.category,
                 good_count = excluded.good_count,
                 bad_count = excluded.bad_count,
                 total_good = excluded.total_good,
                 total_bad = excluded.total_bad"#,
        )
        .bind(attribute.id.to_string())
        .bind(attribute.characteristic_id.to_string())
        .bind(&attribute.label)
        .bind(bin.min_value)
        .bind(bin.max_value)
        .bind(&bin.category)
        .bind(attribute.counts.good_count as i64)
        .bind(attribute.counts.bad_count as i64)
        .bind(attribute.counts.total_good as i64)
        .bind(attribute.counts.total_bad as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn delete_attribute(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM attributes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
