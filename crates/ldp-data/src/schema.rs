//! Schema Registry
//!
//! Single authoritative definition of every column in the measurement tables.
//! Jobs refer to columns through [`Column`] instead of ad-hoc strings, so a
//! writer always knows the SQL name, type, key scope and null policy of what
//! it writes.

use crate::record::NullPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary measurement table.
pub const LDP_TABLE: &str = "ldp";

/// Working copy used by the quadratic regression job.
pub const BACKUP_TABLE: &str = "backup";

/// Companion table holding linear predictions and their R² score.
pub const PREDICTIONS_TABLE: &str = "ldp_predictions";

/// SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// Boolean flag (stored as 0/1)
    Boolean,
    /// Floating point number
    Float,
    /// Integer
    Int,
    /// Text
    Text,
}

impl SqlType {
    /// Type name used in DDL statements.
    pub const fn ddl(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Float => "FLOAT",
            Self::Int => "INT",
            Self::Text => "TEXT",
        }
    }
}

/// How a derived column is addressed when it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyScope {
    /// One value per (Key Date, Business ID) row
    Row,
    /// One value per Business ID, broadcast to all of its rows
    Entity,
}

/// Every column known to the jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    /// Observation date
    KeyDate,
    /// Entity identifier
    BusinessId,
    /// Observed value
    Value,
    /// Difference to the previous period
    Change,
    /// Sign of `Change`
    ChangeIndicator,
    /// Inside mean ± 2 std (zero-filled series)
    WithinRange,
    /// Inside mean ± 2 std (nulls excluded)
    Within2StdRange,
    /// Per-entity sample std, written per row
    Volatility,
    /// Per-entity sample std, written per entity
    StandardDeviation,
    /// Regression slope of value over calendar days
    Steigung,
    /// Regression slope of the change series over calendar days
    SteigungTrend,
    /// Linear regression prediction
    LinearPredictedValue,
    /// Quadratic regression prediction
    QuadratischePredictedValue,
    /// Linear R² percentage
    LinearBestimmtheitsgrad,
    /// Quadratic R² percentage
    QuadratischBestimmtheitsgrad,
    /// R² percentage recomputed from stored linear predictions
    BgLinear,
    /// Marker for synthetic forecast rows
    Forecast,
}

impl Column {
    /// Columns every measurement table carries.
    pub const BASE: [Self; 3] = [Self::KeyDate, Self::BusinessId, Self::Value];

    /// Column name as stored in the database.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::KeyDate => "Key Date",
            Self::BusinessId => "Business ID",
            Self::Value => "Value",
            Self::Change => "Change",
            Self::ChangeIndicator => "Change Indicator",
            Self::WithinRange => "Within_Range",
            Self::Within2StdRange => "Within_2Std_Range",
            Self::Volatility => "Volatility",
            Self::StandardDeviation => "Standard Deviation",
            Self::Steigung => "Steigung",
            Self::SteigungTrend => "SteigungTrend",
            Self::LinearPredictedValue => "LinearPredictedValue",
            Self::QuadratischePredictedValue => "QuadratischePredictedValue",
            Self::LinearBestimmtheitsgrad => "LinearBestimmtheitsgrad",
            Self::QuadratischBestimmtheitsgrad => "QuadratischBestimmtheitsgrad",
            Self::BgLinear => "BG_linear",
            Self::Forecast => "Forecast",
        }
    }

    /// SQL type used when the column is added.
    pub const fn sql_type(&self) -> SqlType {
        match self {
            Self::KeyDate | Self::BusinessId => SqlType::Text,
            Self::WithinRange | Self::Within2StdRange | Self::Forecast => SqlType::Boolean,
            Self::ChangeIndicator => SqlType::Int,
            _ => SqlType::Float,
        }
    }

    /// Whether the column is produced by a job.
    pub const fn is_derived(&self) -> bool {
        !matches!(self, Self::KeyDate | Self::BusinessId | Self::Value)
    }

    /// `ALTER TABLE .. ADD COLUMN` fragment.
    pub fn ddl(&self) -> String {
        format!("{} {}", quote_ident(self.name()), self.sql_type().ddl())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry entry describing a derived statistic.
#[derive(Debug, Clone, Copy)]
pub struct DerivedColumnInfo {
    /// Column written
    pub column: Column,
    /// How the column is keyed on write
    pub scope: KeyScope,
    /// Null handling applied to `Value` before the statistic is computed
    pub null_policy: NullPolicy,
    /// Brief description
    pub description: &'static str,
}

const DERIVED_COLUMNS: &[DerivedColumnInfo] = &[
    DerivedColumnInfo {
        column: Column::Change,
        scope: KeyScope::Row,
        null_policy: NullPolicy::FillZero,
        description: "Difference to the previous period, 0 for the first row",
    },
    DerivedColumnInfo {
        column: Column::ChangeIndicator,
        scope: KeyScope::Row,
        null_policy: NullPolicy::FillZero,
        description: "Sign of Change as -1, 0 or 1",
    },
    DerivedColumnInfo {
        column: Column::WithinRange,
        scope: KeyScope::Row,
        null_policy: NullPolicy::FillZero,
        description: "Value within mean ± 2 sample std of its entity",
    },
    DerivedColumnInfo {
        column: Column::Within2StdRange,
        scope: KeyScope::Row,
        null_policy: NullPolicy::Keep,
        description: "Value within mean ± 2 sample std, null values excluded",
    },
    DerivedColumnInfo {
        column: Column::Volatility,
        scope: KeyScope::Row,
        null_policy: NullPolicy::FillZero,
        description: "Sample std of the entity's values",
    },
    DerivedColumnInfo {
        column: Column::StandardDeviation,
        scope: KeyScope::Entity,
        null_policy: NullPolicy::Keep,
        description: "Sample std of the entity's non-null values",
    },
    DerivedColumnInfo {
        column: Column::Steigung,
        scope: KeyScope::Entity,
        null_policy: NullPolicy::Keep,
        description: "OLS slope of value over days since 2022-01-01",
    },
    DerivedColumnInfo {
        column: Column::SteigungTrend,
        scope: KeyScope::Entity,
        null_policy: NullPolicy::Keep,
        description: "OLS slope of the change series over days since 2022-01-01",
    },
    DerivedColumnInfo {
        column: Column::LinearPredictedValue,
        scope: KeyScope::Row,
        null_policy: NullPolicy::Keep,
        description: "Linear regression prediction over the sequence index",
    },
    DerivedColumnInfo {
        column: Column::QuadratischePredictedValue,
        scope: KeyScope::Row,
        null_policy: NullPolicy::Keep,
        description: "Quadratic regression prediction over the sequence index",
    },
    DerivedColumnInfo {
        column: Column::LinearBestimmtheitsgrad,
        scope: KeyScope::Row,
        null_policy: NullPolicy::Keep,
        description: "Linear R² in percent",
    },
    DerivedColumnInfo {
        column: Column::QuadratischBestimmtheitsgrad,
        scope: KeyScope::Row,
        null_policy: NullPolicy::Keep,
        description: "Quadratic R² in percent",
    },
    DerivedColumnInfo {
        column: Column::BgLinear,
        scope: KeyScope::Row,
        null_policy: NullPolicy::Keep,
        description: "R² in percent of stored linear predictions over realized rows",
    },
];

/// All derived statistics with their scope and null policy.
pub const fn derived_columns() -> &'static [DerivedColumnInfo] {
    DERIVED_COLUMNS
}

/// Registry entry for a derived column.
pub fn derived_column_info(column: Column) -> Option<&'static DerivedColumnInfo> {
    derived_columns().iter().find(|info| info.column == column)
}

/// Quote an identifier for SQLite.
///
/// Column names contain spaces, so every identifier is double-quoted.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every registered column, base columns first.
    const ALL_COLUMNS: [Column; 17] = [
        Column::KeyDate,
        Column::BusinessId,
        Column::Value,
        Column::Change,
        Column::ChangeIndicator,
        Column::WithinRange,
        Column::Within2StdRange,
        Column::Volatility,
        Column::StandardDeviation,
        Column::Steigung,
        Column::SteigungTrend,
        Column::LinearPredictedValue,
        Column::QuadratischePredictedValue,
        Column::LinearBestimmtheitsgrad,
        Column::QuadratischBestimmtheitsgrad,
        Column::BgLinear,
        Column::Forecast,
    ];

    #[test]
    fn test_column_names_are_unique() {
        let mut names: Vec<&str> = ALL_COLUMNS.iter().map(Column::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ALL_COLUMNS.len());
    }

    #[test]
    fn test_sql_types() {
        assert_eq!(Column::WithinRange.sql_type(), SqlType::Boolean);
        assert_eq!(Column::ChangeIndicator.sql_type(), SqlType::Int);
        assert_eq!(Column::Volatility.sql_type(), SqlType::Float);
        assert_eq!(Column::Change.ddl(), "\"Change\" FLOAT");
        assert_eq!(
            Column::StandardDeviation.ddl(),
            "\"Standard Deviation\" FLOAT"
        );
    }

    #[test]
    fn test_every_derived_column_registered() {
        for column in ALL_COLUMNS {
            if column.is_derived() && column != Column::Forecast {
                assert!(
                    derived_column_info(column).is_some(),
                    "{} missing from registry",
                    column
                );
            }
        }
    }

    #[test]
    fn test_broadcast_scopes() {
        let scope = |c| derived_column_info(c).unwrap().scope;
        assert_eq!(scope(Column::StandardDeviation), KeyScope::Entity);
        assert_eq!(scope(Column::Steigung), KeyScope::Entity);
        assert_eq!(scope(Column::SteigungTrend), KeyScope::Entity);
        assert_eq!(scope(Column::Volatility), KeyScope::Row);
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("Key Date"), "\"Key Date\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
