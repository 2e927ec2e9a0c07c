//! Measurement records and the per-entity partition structure.

use chrono::NaiveDate;
use derive_more::{Display, From};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one time series.
///
/// The source tables store it either as an integer or as text. Integers order
/// before text, so a mixed column still sorts deterministically.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum BusinessId {
    /// Numeric identifier
    #[display("{_0}")]
    Integer(i64),
    /// Textual identifier
    #[display("{_0}")]
    Text(String),
}

impl From<&str> for BusinessId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl ToSql for BusinessId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(v) => Ok(ToSqlOutput::from(*v)),
            Self::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}

impl FromSql for BusinessId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(Self::Integer(v)),
            // Integer ids that went through a float column
            ValueRef::Real(v) if v.fract() == 0.0 => Ok(Self::Integer(v as i64)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Self::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// One row of a measurement table after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Observation date
    pub key_date: NaiveDate,
    /// Observed value, `None` when the cell was null and the policy kept it
    pub value: Option<f64>,
    /// Additional numeric columns requested by the job, in request order
    pub inputs: Vec<Option<f64>>,
}

impl Observation {
    /// Create an observation without additional inputs.
    pub const fn new(key_date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            key_date,
            value,
            inputs: Vec::new(),
        }
    }

    /// Value of the `index`-th requested input column.
    pub fn input(&self, index: usize) -> Option<f64> {
        self.inputs.get(index).copied().flatten()
    }
}

/// All observations of one entity, ordered by `Key Date` ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Entity the observations belong to
    pub business_id: BusinessId,
    /// Observations sorted by date
    pub observations: Vec<Observation>,
}

impl Partition {
    /// Create a partition, sorting the observations by date.
    pub fn new(business_id: impl Into<BusinessId>, mut observations: Vec<Observation>) -> Self {
        observations.sort_by_key(|o| o.key_date);
        Self {
            business_id: business_id.into(),
            observations,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the partition holds no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Values in date order, nulls included.
    pub fn values(&self) -> Vec<Option<f64>> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Non-null values in date order.
    pub fn realized_values(&self) -> Vec<f64> {
        self.observations.iter().filter_map(|o| o.value).collect()
    }

    /// Latest observation date.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.key_date)
    }

    /// Earliest observation date.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.key_date)
    }
}

/// How the loader treats a null `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NullPolicy {
    /// Replace null values with 0.0
    FillZero,
    /// Exclude rows with a null value
    Drop,
    /// Keep rows with a null value; the statistic skips them itself
    Keep,
}

impl NullPolicy {
    /// Command line spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FillZero => "fill-zero",
            Self::Drop => "drop",
            Self::Keep => "keep",
        }
    }
}

impl fmt::Display for NullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NullPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fill-zero" | "fill" | "zero" => Ok(Self::FillZero),
            "drop" => Ok(Self::Drop),
            "keep" => Ok(Self::Keep),
            _ => Err(format!("Unknown null policy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    #[test]
    fn test_partition_sorts_by_date() {
        let partition = Partition::new(
            "A",
            vec![
                Observation::new(date(3), Some(3.0)),
                Observation::new(date(1), Some(1.0)),
                Observation::new(date(2), None),
            ],
        );

        assert_eq!(partition.first_date(), Some(date(1)));
        assert_eq!(partition.last_date(), Some(date(3)));
        assert_eq!(partition.values(), vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(partition.realized_values(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_business_id_ordering_and_display() {
        let mut ids = vec![
            BusinessId::from("B"),
            BusinessId::from(10_i64),
            BusinessId::from("A"),
            BusinessId::from(2_i64),
        ];
        ids.sort();

        let shown: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["2", "10", "A", "B"]);
    }

    #[test]
    fn test_null_policy_parse() {
        assert_eq!("fill-zero".parse::<NullPolicy>().unwrap(), NullPolicy::FillZero);
        assert_eq!("DROP".parse::<NullPolicy>().unwrap(), NullPolicy::Drop);
        assert_eq!("keep".parse::<NullPolicy>().unwrap(), NullPolicy::Keep);
        assert!("interpolate".parse::<NullPolicy>().is_err());
    }
}
