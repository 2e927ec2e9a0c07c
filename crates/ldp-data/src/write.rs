//! Write plans produced by the jobs and executed by the store.

use crate::error::DataError;
use crate::frame::format_key_date;
use crate::record::BusinessId;
use crate::schema::{Column, KeyScope};
use chrono::NaiveDate;
use rusqlite::ToSql;
use rusqlite::types::{Null, ToSqlOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A single derived cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    /// SQL NULL
    Null,
    /// Floating point value
    Real(f64),
    /// Integer value
    Integer(i64),
    /// Boolean flag
    Bool(bool),
}

impl CellValue {
    /// Whether the cell is NULL (non-finite reals count as NULL).
    pub const fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Real(v) => !v.is_finite(),
            _ => false,
        }
    }

    /// Numeric view of the cell.
    pub const fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Real(v) if v.is_finite() => Some(v),
            Self::Integer(v) => Some(v as f64),
            Self::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Real)
    }
}

impl From<Option<bool>> for CellValue {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Null, Self::Bool)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match *self {
            Self::Real(v) if v.is_finite() => Ok(ToSqlOutput::from(v)),
            Self::Integer(v) => Ok(ToSqlOutput::from(v)),
            Self::Bool(v) => Ok(ToSqlOutput::from(v)),
            _ => Ok(ToSqlOutput::from(Null)),
        }
    }
}

/// One row of job output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    /// Observation date
    pub key_date: NaiveDate,
    /// Entity identifier
    pub business_id: BusinessId,
    /// Observed value (null for forecast rows)
    pub value: Option<f64>,
    /// Whether this is a synthetic forecast row
    pub forecast: bool,
    /// Derived cells, aligned with [`WritePlan::columns`]
    pub cells: Vec<CellValue>,
}

impl OutputRow {
    /// A row for a realized observation.
    pub const fn realized(
        key_date: NaiveDate,
        business_id: BusinessId,
        value: Option<f64>,
        cells: Vec<CellValue>,
    ) -> Self {
        Self {
            key_date,
            business_id,
            value,
            forecast: false,
            cells,
        }
    }

    /// A synthetic forecast row with a null value.
    pub const fn forecast(key_date: NaiveDate, business_id: BusinessId, cells: Vec<CellValue>) -> Self {
        Self {
            key_date,
            business_id,
            value: None,
            forecast: true,
            cells,
        }
    }
}

/// Everything a job wants written to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    /// Target table
    pub table: String,
    /// How realized rows are addressed
    pub scope: KeyScope,
    /// Derived columns written, in cell order
    pub columns: Vec<Column>,
    /// Output rows in (Business ID, Key Date) order
    pub rows: Vec<OutputRow>,
    /// Entities the loader saw, including those that produced no rows
    pub entities: Vec<BusinessId>,
    /// Whether earlier forecast rows of every entity are replaced
    pub regenerates_forecasts: bool,
}

impl WritePlan {
    /// Create an empty plan.
    pub fn new(table: impl Into<String>, scope: KeyScope, columns: Vec<Column>) -> Self {
        Self {
            table: table.into(),
            scope,
            columns,
            rows: Vec::new(),
            entities: Vec::new(),
            regenerates_forecasts: false,
        }
    }

    /// Number of forecast rows.
    pub fn forecast_count(&self) -> usize {
        self.rows.iter().filter(|r| r.forecast).count()
    }

    /// Distinct entities in plan order.
    pub fn business_ids(&self) -> Vec<&BusinessId> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|r| &r.business_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Loaded entities without any output row.
    ///
    /// Their earlier cells are stale and get cleared by the targeted writer.
    pub fn stale_entities(&self) -> Vec<&BusinessId> {
        let written: HashSet<&BusinessId> = self.rows.iter().map(|r| &r.business_id).collect();
        self.entities.iter().filter(|id| !written.contains(id)).collect()
    }

    /// Every entity whose forecast rows a regenerating write replaces.
    pub fn forecast_entities(&self) -> Vec<&BusinessId> {
        let mut ids = self.business_ids();
        ids.extend(self.stale_entities());
        ids
    }

    /// Check that every row carries one cell per column.
    pub fn validate(&self) -> Result<(), DataError> {
        match self.rows.iter().find(|r| r.cells.len() != self.columns.len()) {
            Some(row) => Err(DataError::Write(format!(
                "row {} of {} has {} cells for {} columns",
                format_key_date(row.key_date),
                row.business_id,
                row.cells.len(),
                self.columns.len()
            ))),
            None => Ok(()),
        }
    }
}

/// How a plan reaches the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteStrategy {
    /// Keyed updates inside one transaction
    #[default]
    Targeted,
    /// Drop and recreate the table from the plan (deprecated, not idempotent)
    Replace,
}

impl WriteStrategy {
    /// Command line spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Targeted => "targeted",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "targeted" | "update" => Ok(Self::Targeted),
            "replace" => Ok(Self::Replace),
            _ => Err(format!("Unknown write strategy: {}", s)),
        }
    }
}

/// Counts reported by a writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    /// Rows changed by keyed updates
    pub rows_updated: usize,
    /// Realized rows inserted because no row matched the key
    pub rows_inserted: usize,
    /// Forecast rows inserted
    pub forecast_rows: usize,
    /// Earlier forecast rows deleted
    pub forecast_rows_removed: usize,
    /// Rows of loaded entities without output whose cells were set to NULL
    pub rows_cleared: usize,
}
