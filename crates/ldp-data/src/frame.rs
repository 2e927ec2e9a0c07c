//! In-memory measurement frame.
//!
//! Rows read from a table are held in a polars `DataFrame`, where the date
//! coercion, the (Business ID, Key Date) sort and the null policy are applied.
//! Business IDs are dictionary encoded: the frame stores the index of each id
//! in a sorted dictionary, which keeps integer and text ids ordered the same
//! way [`BusinessId`] orders them.

use crate::error::{DataError, Result};
use crate::record::{BusinessId, NullPolicy, Observation, Partition};
use crate::schema::Column;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

const ENTITY_COLUMN: &str = "entity";

/// A row as read from the database, before sorting and null handling.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    /// Observation date
    pub key_date: NaiveDate,
    /// Entity identifier
    pub business_id: BusinessId,
    /// Observed value
    pub value: Option<f64>,
    /// Additional numeric columns
    pub inputs: Vec<Option<f64>>,
}

/// Sorted, null-handled measurements of one table.
#[derive(Debug, Clone)]
pub struct MeasurementFrame {
    df: DataFrame,
    entities: Vec<BusinessId>,
    inputs: Vec<Column>,
}

impl MeasurementFrame {
    /// Build a frame from raw rows.
    ///
    /// # Arguments
    /// * `rows` - Rows in any order
    /// * `inputs` - Names of the additional columns carried in `RawMeasurement::inputs`
    /// * `policy` - Null handling for `Value`
    pub fn from_rows(
        rows: Vec<RawMeasurement>,
        inputs: &[Column],
        policy: NullPolicy,
    ) -> Result<Self> {
        let mut entities: Vec<BusinessId> = rows.iter().map(|r| r.business_id.clone()).collect();
        entities.sort();
        entities.dedup();

        let mut entity_codes = Vec::with_capacity(rows.len());
        let mut days = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        let mut input_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); inputs.len()];

        for row in &rows {
            let code = entities
                .binary_search(&row.business_id)
                .map_err(|_| DataError::Parse(format!("Unknown business id {}", row.business_id)))?;
            entity_codes.push(code as u32);
            days.push(days_since_epoch(row.key_date));
            values.push(row.value);
            for (slot, column) in input_values.iter_mut().enumerate() {
                column.push(row.inputs.get(slot).copied().flatten());
            }
        }

        let mut columns: Vec<polars::prelude::Column> = vec![
            Series::new(ENTITY_COLUMN.into(), entity_codes).into(),
            Series::new(Column::KeyDate.name().into(), days).into(),
            Series::new(Column::Value.name().into(), values).into(),
        ];
        for (column, data) in inputs.iter().zip(input_values) {
            columns.push(Series::new(column.name().into(), data).into());
        }

        let df = DataFrame::new(columns)?;

        let lazy = df
            .lazy()
            .with_column(col(Column::KeyDate.name()).cast(DataType::Date));

        let lazy = match policy {
            NullPolicy::FillZero => {
                lazy.with_column(col(Column::Value.name()).fill_null(lit(0.0)))
            }
            NullPolicy::Drop => lazy.filter(col(Column::Value.name()).is_not_null()),
            NullPolicy::Keep => lazy,
        };

        let df = lazy
            .sort(
                [ENTITY_COLUMN, Column::KeyDate.name()],
                SortMultipleOptions::default().with_maintain_order(true),
            )
            .collect()?;

        Ok(Self {
            df,
            entities,
            inputs: inputs.to_vec(),
        })
    }

    /// Number of rows after null handling.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Whether the frame holds no rows.
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Distinct business ids seen by the loader, including ids whose rows were all dropped.
    pub fn business_ids(&self) -> &[BusinessId] {
        &self.entities
    }

    /// Additional columns carried by the observations.
    pub fn inputs(&self) -> &[Column] {
        &self.inputs
    }

    /// Underlying data frame.
    pub const fn data(&self) -> &DataFrame {
        &self.df
    }

    /// Split the frame into per-entity partitions in Business ID order.
    pub fn partitions(&self) -> Result<Vec<Partition>> {
        let entity = self.df.column(ENTITY_COLUMN)?.u32()?;
        let days = self.df.column(Column::KeyDate.name())?.cast(&DataType::Int32)?;
        let days = days.i32()?;
        let values = self.df.column(Column::Value.name())?.f64()?;
        let inputs = self
            .inputs
            .iter()
            .map(|c| self.df.column(c.name()).and_then(|s| s.f64()))
            .collect::<PolarsResult<Vec<_>>>()?;

        let mut partitions: Vec<Partition> = Vec::new();
        let mut current: Option<(u32, Vec<Observation>)> = None;

        for i in 0..self.df.height() {
            let code = entity
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing business id".to_string()))?;
            let day = days
                .get(i)
                .ok_or_else(|| DataError::Parse("Missing key date".to_string()))?;

            let observation = Observation {
                key_date: date_from_days(day)?,
                value: values.get(i),
                inputs: inputs.iter().map(|c| c.get(i)).collect(),
            };

            match current.as_mut() {
                Some((c, observations)) if *c == code => observations.push(observation),
                _ => {
                    if let Some((c, observations)) = current.take() {
                        partitions.push(self.partition(c, observations)?);
                    }
                    current = Some((code, vec![observation]));
                }
            }
        }

        if let Some((c, observations)) = current {
            partitions.push(self.partition(c, observations)?);
        }

        Ok(partitions)
    }

    fn partition(&self, code: u32, observations: Vec<Observation>) -> Result<Partition> {
        let business_id = self
            .entities
            .get(code as usize)
            .cloned()
            .ok_or_else(|| DataError::Parse(format!("Unknown entity code {}", code)))?;
        // Rows arrive sorted from the frame
        Ok(Partition {
            business_id,
            observations,
        })
    }
}

/// Parse a `Key Date` cell.
///
/// Accepts plain dates and the timestamp renderings database clients
/// commonly write for date-only values.
pub fn parse_key_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

/// Format a date the way the writers store it.
pub fn format_key_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn date_from_days(days: i32) -> Result<NaiveDate> {
    epoch()
        .checked_add_signed(chrono::Duration::days(i64::from(days)))
        .ok_or_else(|| DataError::Parse(format!("Date out of range: {} days", days)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, id: impl Into<BusinessId>, value: Option<f64>) -> RawMeasurement {
        RawMeasurement {
            key_date: parse_key_date(date).unwrap(),
            business_id: id.into(),
            value,
            inputs: Vec::new(),
        }
    }

    #[test]
    fn test_parse_key_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 3, 31).unwrap();
        assert_eq!(parse_key_date("2023-03-31"), Some(expected));
        assert_eq!(parse_key_date("2023-03-31 00:00:00"), Some(expected));
        assert_eq!(parse_key_date("2023-03-31T00:00:00.000"), Some(expected));
        assert_eq!(parse_key_date("31.03.2023"), None);
    }

    #[test]
    fn test_sorts_by_entity_then_date() {
        let rows = vec![
            raw("2023-01-02", "B", Some(2.0)),
            raw("2023-01-02", "A", Some(12.0)),
            raw("2023-01-01", "B", Some(1.0)),
            raw("2023-01-01", "A", Some(10.0)),
        ];

        let frame = MeasurementFrame::from_rows(rows, &[], NullPolicy::FillZero).unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].business_id, BusinessId::from("A"));
        assert_eq!(partitions[0].values(), vec![Some(10.0), Some(12.0)]);
        assert_eq!(partitions[1].business_id, BusinessId::from("B"));
        assert_eq!(partitions[1].values(), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_fill_zero_policy() {
        let rows = vec![
            raw("2023-01-01", "A", Some(10.0)),
            raw("2023-01-02", "A", None),
        ];

        let frame = MeasurementFrame::from_rows(rows, &[], NullPolicy::FillZero).unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(partitions[0].values(), vec![Some(10.0), Some(0.0)]);
    }

    #[test]
    fn test_drop_policy_keeps_entity_dictionary() {
        let rows = vec![
            raw("2023-01-01", "A", Some(10.0)),
            raw("2023-01-02", "A", None),
            raw("2023-01-01", "B", None),
        ];

        let frame = MeasurementFrame::from_rows(rows, &[], NullPolicy::Drop).unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(frame.height(), 1);
        assert_eq!(frame.business_ids().len(), 2);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].values(), vec![Some(10.0)]);
    }

    #[test]
    fn test_keep_policy_preserves_nulls() {
        let rows = vec![
            raw("2023-01-02", "A", None),
            raw("2023-01-01", "A", Some(10.0)),
        ];

        let frame = MeasurementFrame::from_rows(rows, &[], NullPolicy::Keep).unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(partitions[0].values(), vec![Some(10.0), None]);
    }

    #[test]
    fn test_duplicate_keys_keep_read_order() {
        let rows = vec![
            raw("2023-01-02", "A", Some(3.0)),
            raw("2023-01-01", "A", Some(1.0)),
            raw("2023-01-01", "A", Some(2.0)),
            raw("2023-01-01", "A", Some(0.5)),
        ];

        let frame = MeasurementFrame::from_rows(rows, &[], NullPolicy::Keep).unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(
            partitions[0].values(),
            vec![Some(1.0), Some(2.0), Some(0.5), Some(3.0)]
        );
    }

    #[test]
    fn test_numeric_ids_sort_numerically() {
        let rows = vec![
            raw("2023-01-01", 10_i64, Some(1.0)),
            raw("2023-01-01", 9_i64, Some(2.0)),
        ];

        let frame = MeasurementFrame::from_rows(rows, &[], NullPolicy::Drop).unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(partitions[0].business_id, BusinessId::Integer(9));
        assert_eq!(partitions[1].business_id, BusinessId::Integer(10));
    }

    #[test]
    fn test_inputs_follow_rows() {
        let mut first = raw("2023-01-02", "A", Some(2.0));
        first.inputs = vec![Some(2.5)];
        let mut second = raw("2023-01-01", "A", Some(1.0));
        second.inputs = vec![None];

        let frame = MeasurementFrame::from_rows(
            vec![first, second],
            &[Column::LinearPredictedValue],
            NullPolicy::Drop,
        )
        .unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(partitions[0].observations[0].input(0), None);
        assert_eq!(partitions[0].observations[1].input(0), Some(2.5));
    }
}
