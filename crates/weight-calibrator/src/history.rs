//! Calibration History
//!
//! Persists every monthly calibration report (applied, flagged or
//! insufficient) to the `weight_calibrations` table.

use anyhow::Result;
use chrono::NaiveDate;
use narrative_core::LayerWeights;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::calibrator::{CalibrationReport, CalibrationStatus};

/// One stored calibration, newest-first when listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub id: i64,
    pub entity_id: String,
    pub calibration_date: NaiveDate,
    pub status: CalibrationStatus,
    pub sample_size: i64,
    pub r2_macro: Option<f64>,
    pub r2_sector: Option<f64>,
    pub r2_multiple: Option<f64>,
    pub macro_share: Option<f64>,
    pub sector_share: Option<f64>,
    pub idio_share: Option<f64>,
    pub final_weights: Option<LayerWeights>,
    pub reason: Option<String>,
}

/// DB row with text dates (compatible with the sqlx Any backend)
#[derive(Debug, FromRow)]
struct CalibrationRow {
    id: i64,
    entity_id: String,
    calibration_date: String,
    status: String,
    sample_size: i64,
    r2_macro: Option<f64>,
    r2_sector: Option<f64>,
    r2_multiple: Option<f64>,
    macro_share: Option<f64>,
    sector_share: Option<f64>,
    idio_share: Option<f64>,
    final_macro: Option<f64>,
    final_sector: Option<f64>,
    final_idio: Option<f64>,
    reason: Option<String>,
}

impl CalibrationRow {
    fn into_record(self) -> Result<CalibrationRecord> {
        let status = CalibrationStatus::parse(&self.status)
            .ok_or_else(|| anyhow::anyhow!("unknown calibration status {}", self.status))?;
        let final_weights = match (self.final_macro, self.final_sector, self.final_idio) {
            (Some(m), Some(s), Some(i)) => Some(LayerWeights::new(m, s, i)),
            _ => None,
        };
        Ok(CalibrationRecord {
            id: self.id,
            entity_id: self.entity_id,
            calibration_date: self.calibration_date.parse::<NaiveDate>()?,
            status,
            sample_size: self.sample_size,
            r2_macro: self.r2_macro,
            r2_sector: self.r2_sector,
            r2_multiple: self.r2_multiple,
            macro_share: self.macro_share,
            sector_share: self.sector_share,
            idio_share: self.idio_share,
            final_weights,
            reason: self.reason,
        })
    }
}

#[derive(Clone)]
pub struct CalibrationHistoryStore {
    pool: sqlx::AnyPool,
}

impl CalibrationHistoryStore {
    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the table exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.init_tables().await?;
        Ok(store)
    }

    pub async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS weight_calibrations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id TEXT NOT NULL,
                calibration_date TEXT NOT NULL,
                status TEXT NOT NULL,
                sample_size INTEGER NOT NULL,
                r2_macro REAL,
                r2_sector REAL,
                r2_multiple REAL,
                macro_share REAL,
                sector_share REAL,
                idio_share REAL,
                final_macro REAL,
                final_sector REAL,
                final_idio REAL,
                reason TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_weight_calibrations_entity
             ON weight_calibrations(entity_id, calibration_date)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store one report, returning its row id
    pub async fn record(&self, report: &CalibrationReport) -> Result<i64> {
        let regression = report.regression;
        let shares = report.shares;
        let weights = report.final_weights;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO weight_calibrations (
                entity_id, calibration_date, status, sample_size,
                r2_macro, r2_sector, r2_multiple,
                macro_share, sector_share, idio_share,
                final_macro, final_sector, final_idio, reason
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&report.entity_id)
        .bind(report.date.to_string())
        .bind(report.status.as_str())
        .bind(report.sample_size as i64)
        .bind(regression.map(|r| r.r2_macro))
        .bind(regression.map(|r| r.r2_sector))
        .bind(regression.map(|r| r.r2_multiple))
        .bind(shares.map(|s| s.macro_share))
        .bind(shares.map(|s| s.sector_share))
        .bind(shares.map(|s| s.idio_share))
        .bind(weights.map(|w| w.macro_weight))
        .bind(weights.map(|w| w.sector_weight))
        .bind(weights.map(|w| w.idio_weight))
        .bind(report.reason.clone())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Calibrations for one entity, newest first
    pub async fn for_entity(&self, entity_id: &str, limit: i64) -> Result<Vec<CalibrationRecord>> {
        let rows: Vec<CalibrationRow> = sqlx::query_as(
            r#"
            SELECT
                id, entity_id, calibration_date, status, sample_size,
                r2_macro, r2_sector, r2_multiple,
                macro_share, sector_share, idio_share,
                final_macro, final_sector, final_idio, reason
            FROM weight_calibrations
            WHERE entity_id = ?
            ORDER BY calibration_date DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_record()).collect()
    }

    pub async fn latest(&self, entity_id: &str) -> Result<Option<CalibrationRecord>> {
        Ok(self.for_entity(entity_id, 1).await?.into_iter().next())
    }

    /// Entities whose most recent calibration was flagged for review
    pub async fn flagged_entities(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT w.entity_id
            FROM weight_calibrations w
            WHERE w.status = 'FLAGGED'
              AND w.id = (
                  SELECT MAX(id) FROM weight_calibrations x
                  WHERE x.entity_id = w.entity_id
              )
            ORDER BY w.entity_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
