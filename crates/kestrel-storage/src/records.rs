// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`RecordStore`] trait.
//!
//! Period windows are computed from the local calendar date and compared
//! against `date(timestamp)`, so timestamps may use either a `T` or a space
//! between date and time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use kestrel_config::model::StorageConfig;
use kestrel_core::{
    AdapterType, FailAnalysis, FailGroup, HealthStatus, InspectionRecord, KestrelError,
    Period, PluginAdapter, RecordFilter, RecordStore, Statistics, TrendPoint, Verdict,
};
use rusqlite::params_from_iter;
use tracing::debug;

use crate::database::{Database, map_tr_err};

const RECORD_COLUMNS: &str = "id, timestamp, device_id, image_id, result, station";

const COUNT_COLUMNS: &str = "COUNT(*), \
     SUM(CASE WHEN lower(result) = 'pass' THEN 1 ELSE 0 END), \
     SUM(CASE WHEN lower(result) = 'fail' THEN 1 ELSE 0 END)";

/// SQLite-backed inspection record store.
pub struct SqliteRecordStore {
    db: Database,
    pinned_date: Option<NaiveDate>,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            pinned_date: None,
        }
    }

    /// Opens the database named by the storage configuration.
    pub async fn open(config: &StorageConfig) -> Result<Self, KestrelError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self::new(db))
    }

    /// Evaluates periods against `date` instead of the local calendar.
    pub fn with_pinned_date(mut self, date: NaiveDate) -> Self {
        self.pinned_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.pinned_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// `date(timestamp)` condition and its parameter for `period`.
    fn period_clause(&self, period: Period) -> Option<(&'static str, String)> {
        let today = self.today();
        let back = |days: u64| {
            today
                .checked_sub_days(Days::new(days))
                .unwrap_or(today)
                .format("%Y-%m-%d")
                .to_string()
        };
        match period {
            Period::Today => Some(("date(timestamp) = ?", back(0))),
            Period::Yesterday => Some(("date(timestamp) = ?", back(1))),
            Period::Week => Some(("date(timestamp) >= ?", back(7))),
            Period::Month => Some(("date(timestamp) >= ?", back(30))),
            Period::All => None,
        }
    }

    /// Inserts or replaces records, keeping their ids when positive.
    pub async fn insert(&self, records: &[InspectionRecord]) -> Result<usize, KestrelError> {
        let records = records.to_vec();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO inspections \
                         (id, timestamp, device_id, image_id, result, station) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for record in &records {
                        stmt.execute(rusqlite::params![
                            (record.id > 0).then_some(record.id),
                            record.timestamp,
                            record.device_id,
                            record.image_id,
                            record.result.to_string(),
                            record.station,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(records.len())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn count(
        &self,
        clause: Option<(&'static str, String)>,
    ) -> Result<Statistics, KestrelError> {
        let (sql, params) = match clause {
            Some((condition, param)) => (
                format!("SELECT {COUNT_COLUMNS} FROM inspections WHERE {condition}"),
                vec![param],
            ),
            None => (format!("SELECT {COUNT_COLUMNS} FROM inspections"), vec![]),
        };
        let (total, pass, fail) = self
            .db
            .connection()
            .call(move |conn| {
                conn.query_row(&sql, params_from_iter(params.iter()), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    ))
                })
            })
            .await
            .map_err(map_tr_err)?;
        Ok(Statistics::from_counts(
            total.max(0) as u64,
            pass.max(0) as u64,
            fail.max(0) as u64,
        ))
    }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InspectionRecord> {
    let result: String = row.get(4)?;
    let result = Verdict::from_str(&result).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(InspectionRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        device_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        image_id: row.get(3)?,
        result,
        station: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

#[async_trait]
impl PluginAdapter for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, KestrelError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KestrelError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_statistics(&self, period: Period) -> Result<Statistics, KestrelError> {
        self.count(self.period_clause(period)).await
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<InspectionRecord>, KestrelError> {
        self.query(&RecordFilter {
            limit,
            ..Default::default()
        })
        .await
    }

    async fn get_fail_analysis(&self) -> Result<FailAnalysis, KestrelError> {
        let today = self.today().format("%Y-%m-%d").to_string();
        let groups = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT device_id, station, COUNT(*) AS fail_count, \
                     MIN(timestamp), MAX(timestamp) \
                     FROM inspections \
                     WHERE date(timestamp) = ?1 AND lower(result) = 'fail' \
                     GROUP BY device_id, station \
                     ORDER BY fail_count DESC, device_id ASC, station ASC",
                )?;
                let rows = stmt.query_map([today], |row| {
                    Ok(FailGroup {
                        device_id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        station: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        fail_count: row.get::<_, i64>(2)?.max(0) as u64,
                        first_fail: row.get(3)?,
                        last_fail: row.get(4)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(map_tr_err)?;
        Ok(FailAnalysis { groups })
    }

    async fn get_trend(&self, period: Period) -> Result<Vec<TrendPoint>, KestrelError> {
        let today = self.today();
        let since = today
            .checked_sub_days(Days::new(u64::from(period.trend_days())))
            .unwrap_or(today)
            .format("%Y-%m-%d")
            .to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT date(timestamp) AS day, {COUNT_COLUMNS} \
                     FROM inspections \
                     WHERE date(timestamp) >= ?1 \
                     GROUP BY day \
                     ORDER BY day ASC"
                ))?;
                let rows = stmt.query_map([since], |row| {
                    let total = row.get::<_, i64>(1)?.max(0) as u64;
                    let pass = row.get::<_, Option<i64>>(2)?.unwrap_or(0).max(0) as u64;
                    let fail = row.get::<_, Option<i64>>(3)?.unwrap_or(0).max(0) as u64;
                    Ok(TrendPoint {
                        date: row.get(0)?,
                        total,
                        pass,
                        fail,
                        pass_rate: Statistics::from_counts(total, pass, fail).pass_rate,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<InspectionRecord>, KestrelError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        if let Some((condition, param)) = filter.period.and_then(|p| self.period_clause(p)) {
            conditions.push(condition);
            params.push(param);
        }
        if let Some(device) = &filter.device_id {
            conditions.push("device_id = ? COLLATE NOCASE");
            params.push(device.clone());
        }
        if let Some(station) = &filter.station {
            conditions.push("station = ? COLLATE NOCASE");
            params.push(station.clone());
        }
        if let Some(result) = filter.result {
            conditions.push("lower(result) = ?");
            params.push(result.to_string());
        }

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM inspections");
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY datetime(timestamp) DESC, id DESC");
        if filter.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", filter.limit));
        }

        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(params.iter()), record_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(map_tr_err)
    }
}
