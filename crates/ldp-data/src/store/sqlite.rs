//! SQLite store for the measurement tables.

use crate::error::{DataError, Result};
use crate::frame::{MeasurementFrame, RawMeasurement, format_key_date, parse_key_date};
use crate::record::{BusinessId, NullPolicy};
use crate::schema::{Column, KeyScope, quote_ident};
use crate::write::{OutputRow, WritePlan, WriteSummary};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, ToSql, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a schema check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnStatus {
    /// Column was already present
    Existing,
    /// Column was added by this call
    Added,
}

/// SQLite store holding one connection for the duration of a job.
///
/// The connection is closed when the store is dropped.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Underlying connection.
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Check whether a table exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Column names of a table in catalog order.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Check whether a column exists on a table.
    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.columns(table)?.iter().any(|c| c == column))
    }

    /// Add a column when it is missing.
    pub fn ensure_column(&self, table: &str, column: Column) -> Result<ColumnStatus> {
        if self.column_exists(table, column.name())? {
            debug!(table, column = column.name(), "column already present");
            return Ok(ColumnStatus::Existing);
        }

        self.conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(table),
                column.ddl()
            ),
            [],
        )?;
        info!(table, column = column.name(), "added column");
        Ok(ColumnStatus::Added)
    }

    /// Create a measurement table with the base columns plus `columns` when it does not exist.
    ///
    /// Returns `true` if the table was created.
    pub fn ensure_table(&self, table: &str, columns: &[Column]) -> Result<bool> {
        if self.table_exists(table)? {
            return Ok(false);
        }

        let mut defs = vec![
            format!("{} TEXT NOT NULL", quote_ident(Column::KeyDate.name())),
            format!("{} TEXT NOT NULL", quote_ident(Column::BusinessId.name())),
            Column::Value.ddl(),
        ];
        defs.extend(columns.iter().filter(|c| c.is_derived()).map(Column::ddl));

        self.conn.execute(
            &format!("CREATE TABLE {} ({})", quote_ident(table), defs.join(", ")),
            [],
        )?;
        info!(table, "created table");
        Ok(true)
    }

    /// Insert raw measurements (used by ingestion tooling and tests).
    pub fn put_measurements(&self, table: &str, rows: &[RawMeasurement]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
                quote_ident(table),
                quote_ident(Column::KeyDate.name()),
                quote_ident(Column::BusinessId.name()),
                quote_ident(Column::Value.name()),
            ))?;
            for row in rows {
                stmt.execute(params![
                    format_key_date(row.key_date),
                    row.business_id,
                    row.value
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Count the rows of a table.
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Load a table into a sorted, null-handled frame.
    ///
    /// Rows marked as forecasts are never loaded.
    ///
    /// # Arguments
    /// * `table` - Table to read
    /// * `inputs` - Additional numeric columns to carry along
    /// * `policy` - Null handling for `Value`
    pub fn load_frame(
        &self,
        table: &str,
        inputs: &[Column],
        policy: NullPolicy,
    ) -> Result<MeasurementFrame> {
        if !self.table_exists(table)? {
            return Err(DataError::TableNotFound(table.to_string()));
        }

        let available = self.columns(table)?;
        for column in Column::BASE.iter().chain(inputs) {
            if !available.iter().any(|c| c == column.name()) {
                return Err(DataError::MissingColumn {
                    table: table.to_string(),
                    column: column.name().to_string(),
                });
            }
        }

        let selected: Vec<String> = Column::BASE
            .iter()
            .chain(inputs)
            .map(|c| quote_ident(c.name()))
            .collect();

        let mut sql = format!("SELECT {} FROM {}", selected.join(", "), quote_ident(table));
        if available.iter().any(|c| c == Column::Forecast.name()) {
            let marker = quote_ident(Column::Forecast.name());
            sql.push_str(&format!(" WHERE {marker} IS NULL OR {marker} = 0"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map([], |row| {
                let key_date: SqlValue = row.get(0)?;
                let business_id: BusinessId = row.get(1)?;
                let value: Option<f64> = row.get(2)?;
                let extra = (0..inputs.len())
                    .map(|i| row.get::<_, Option<f64>>(3 + i))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok((key_date, business_id, value, extra))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for (key_date, business_id, value, extra) in raw {
            let text = match key_date {
                SqlValue::Text(s) => s,
                other => format!("{:?}", other),
            };
            let key_date = parse_key_date(&text).ok_or_else(|| DataError::InvalidDate {
                value: text.clone(),
                business_id: business_id.to_string(),
            })?;
            rows.push(RawMeasurement {
                key_date,
                business_id,
                value,
                inputs: extra,
            });
        }

        info!(table, rows = rows.len(), %policy, "loaded measurements");
        MeasurementFrame::from_rows(rows, inputs, policy)
    }

    /// Apply a plan with keyed updates inside a single transaction.
    ///
    /// Row-scoped cells are matched on (Key Date, Business ID) and inserted when
    /// no row matches; entity-scoped cells update every row of the entity.
    /// Loaded entities that produced no rows have the plan's columns set to
    /// NULL. When the plan regenerates forecasts, earlier forecast rows of
    /// every loaded entity are deleted before the new ones are inserted. Any
    /// failure rolls the whole transaction back.
    pub fn apply_targeted(&self, plan: &WritePlan) -> Result<WriteSummary> {
        plan.validate()?;
        let table = quote_ident(&plan.table);
        let available: HashSet<String> = self.columns(&plan.table)?.into_iter().collect();
        for column in &plan.columns {
            if !available.contains(column.name()) {
                return Err(DataError::MissingColumn {
                    table: plan.table.clone(),
                    column: column.name().to_string(),
                });
            }
        }

        let has_marker = available.contains(Column::Forecast.name());
        if (plan.regenerates_forecasts || plan.forecast_count() > 0) && !has_marker {
            return Err(DataError::MissingColumn {
                table: plan.table.clone(),
                column: Column::Forecast.name().to_string(),
            });
        }

        let key_date = quote_ident(Column::KeyDate.name());
        let business_id = quote_ident(Column::BusinessId.name());
        let assignments = plan
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote_ident(c.name()), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let n = plan.columns.len();
        // Forecast rows are only touched by regeneration
        let realized = if has_marker {
            let marker = quote_ident(Column::Forecast.name());
            format!(" AND ({marker} IS NULL OR {marker} = 0)")
        } else {
            String::new()
        };

        let mut summary = WriteSummary::default();
        let tx = self.conn.unchecked_transaction()?;
        {
            if plan.regenerates_forecasts {
                let mut delete = tx.prepare_cached(&format!(
                    "DELETE FROM {table} WHERE {business_id} = ?1 AND {} = 1",
                    quote_ident(Column::Forecast.name())
                ))?;
                for id in plan.forecast_entities() {
                    summary.forecast_rows_removed += delete.execute(params![id])?;
                }
            }

            let stale = plan.stale_entities();
            if !stale.is_empty() {
                let cleared = plan
                    .columns
                    .iter()
                    .map(|c| format!("{} = NULL", quote_ident(c.name())))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut clear = tx.prepare_cached(&format!(
                    "UPDATE {table} SET {cleared} WHERE {business_id} = ?1{realized}"
                ))?;
                for id in stale {
                    summary.rows_cleared += clear.execute(params![id])?;
                }
            }

            let insert_sql = insert_statement(&table, &plan.columns, false);
            let forecast_sql = insert_statement(&table, &plan.columns, true);

            match plan.scope {
                KeyScope::Row => {
                    let update_sql = format!(
                        "UPDATE {table} SET {assignments} WHERE date({key_date}) = ?{} AND {business_id} = ?{}{realized}",
                        n + 1,
                        n + 2
                    );
                    for row in plan.rows.iter().filter(|r| !r.forecast) {
                        let date = format_key_date(row.key_date);
                        let mut bound: Vec<&dyn ToSql> =
                            row.cells.iter().map(|c| c as &dyn ToSql).collect();
                        bound.push(&date);
                        bound.push(&row.business_id);

                        let changed = tx.prepare_cached(&update_sql)?.execute(&*bound)?;
                        if changed == 0 {
                            tx.prepare_cached(&insert_sql)?
                                .execute(&*insert_params(row, &date, false))?;
                            summary.rows_inserted += 1;
                        } else {
                            summary.rows_updated += changed;
                        }
                    }
                }
                KeyScope::Entity => {
                    let update_sql = format!(
                        "UPDATE {table} SET {assignments} WHERE {business_id} = ?{}{realized}",
                        n + 1
                    );
                    let mut seen = HashSet::new();
                    for row in plan.rows.iter().filter(|r| !r.forecast) {
                        if !seen.insert(&row.business_id) {
                            continue;
                        }
                        let mut bound: Vec<&dyn ToSql> =
                            row.cells.iter().map(|c| c as &dyn ToSql).collect();
                        bound.push(&row.business_id);
                        summary.rows_updated += tx.prepare_cached(&update_sql)?.execute(&*bound)?;
                    }
                }
            }

            for row in plan.rows.iter().filter(|r| r.forecast) {
                let date = format_key_date(row.key_date);
                tx.prepare_cached(&forecast_sql)?
                    .execute(&*insert_params(row, &date, true))?;
                summary.forecast_rows += 1;
            }
        }
        tx.commit()?;

        debug!(table = %plan.table, ?summary, "targeted write committed");
        Ok(summary)
    }

    /// Drop the table and recreate it from the plan.
    ///
    /// Deprecated: columns and rows not carried by the plan are lost, and
    /// repeated runs are not idempotent for tables other jobs also write.
    pub fn replace_table(&self, plan: &WritePlan) -> Result<WriteSummary> {
        plan.validate()?;
        warn!(
            table = %plan.table,
            "replacing whole table; columns not produced by this job are discarded"
        );

        let table = quote_ident(&plan.table);
        let id_type = if plan
            .rows
            .iter()
            .all(|r| matches!(r.business_id, BusinessId::Integer(_)))
        {
            "INTEGER"
        } else {
            "TEXT"
        };

        let mut defs = vec![
            format!("{} TEXT NOT NULL", quote_ident(Column::KeyDate.name())),
            format!("{} {id_type} NOT NULL", quote_ident(Column::BusinessId.name())),
            Column::Value.ddl(),
        ];
        defs.extend(plan.columns.iter().map(Column::ddl));
        defs.push(Column::Forecast.ddl());

        let mut summary = WriteSummary::default();
        let tx = self.conn.unchecked_transaction()?;
        {
            tx.execute(&format!("DROP TABLE IF EXISTS {table}"), [])?;
            tx.execute(&format!("CREATE TABLE {table} ({})", defs.join(", ")), [])?;

            let mut insert = tx.prepare(&insert_statement(&table, &plan.columns, true))?;
            for row in &plan.rows {
                let date = format_key_date(row.key_date);
                insert.execute(&*insert_params(row, &date, true))?;
                if row.forecast {
                    summary.forecast_rows += 1;
                } else {
                    summary.rows_inserted += 1;
                }
            }
        }
        tx.commit()?;

        Ok(summary)
    }
}

fn insert_statement(table: &str, columns: &[Column], forecast: bool) -> String {
    let mut names: Vec<String> = Column::BASE
        .iter()
        .chain(columns)
        .map(|c| quote_ident(c.name()))
        .collect();
    let mut placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    if forecast {
        names.push(quote_ident(Column::Forecast.name()));
        placeholders.push(format!("?{}", placeholders.len() + 1));
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders.join(", ")
    )
}

fn insert_params<'a>(row: &'a OutputRow, date: &'a String, marker: bool) -> Vec<&'a dyn ToSql> {
    let mut bound: Vec<&dyn ToSql> = vec![date, &row.business_id, &row.value];
    bound.extend(row.cells.iter().map(|c| c as &dyn ToSql));
    if marker {
        bound.push(&row.forecast);
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LDP_TABLE;
    use crate::write::CellValue;
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_table(LDP_TABLE, &[]).unwrap();
        let rows = [
            ("A", 1, 10.0),
            ("A", 2, 12.0),
            ("B", 1, 5.0),
        ]
        .iter()
        .map(|(id, d, v)| RawMeasurement {
            key_date: date(1, *d),
            business_id: (*id).into(),
            value: Some(*v),
            inputs: Vec::new(),
        })
        .collect::<Vec<_>>();
        store.put_measurements(LDP_TABLE, &rows).unwrap();
        store
    }

    fn change_of(store: &SqliteStore, id: &str, d: u32) -> Option<f64> {
        store
            .connection()
            .query_row(
                "SELECT \"Change\" FROM ldp WHERE \"Business ID\" = ?1 AND \"Key Date\" = ?2",
                params![id, format_key_date(date(1, d))],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_ensure_column_is_idempotent() {
        let store = seeded_store();

        assert!(!store.column_exists(LDP_TABLE, "Change").unwrap());
        assert_eq!(
            store.ensure_column(LDP_TABLE, Column::Change).unwrap(),
            ColumnStatus::Added
        );
        assert!(store.column_exists(LDP_TABLE, "Change").unwrap());
        assert_eq!(
            store.ensure_column(LDP_TABLE, Column::Change).unwrap(),
            ColumnStatus::Existing
        );
    }

    #[test]
    fn test_ensure_column_on_missing_table_fails() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.ensure_column("nope", Column::Change).is_err());
    }

    #[test]
    fn test_load_frame_missing_table() {
        let store = SqliteStore::in_memory().unwrap();
        let err = store.load_frame("nope", &[], NullPolicy::Drop).unwrap_err();
        assert!(matches!(err, DataError::TableNotFound(_)));
    }

    #[test]
    fn test_load_frame_accepts_timestamp_dates() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_table(LDP_TABLE, &[]).unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO ldp VALUES ('2023-01-02 00:00:00', 'A', 2.0), ('2023-01-01 00:00:00', 'A', NULL)",
                [],
            )
            .unwrap();

        let frame = store
            .load_frame(LDP_TABLE, &[], NullPolicy::FillZero)
            .unwrap();
        let partitions = frame.partitions().unwrap();

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].values(), vec![Some(0.0), Some(2.0)]);
        assert_eq!(partitions[0].first_date(), Some(date(1, 1)));
    }

    #[test]
    fn test_targeted_update_matches_timestamp_keys() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_table(LDP_TABLE, &[Column::Change]).unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO ldp (\"Key Date\", \"Business ID\", \"Value\") VALUES ('2023-01-01 00:00:00', 'A', 1.0)",
                [],
            )
            .unwrap();

        let mut plan = WritePlan::new(LDP_TABLE, KeyScope::Row, vec![Column::Change]);
        plan.rows.push(OutputRow::realized(
            date(1, 1),
            "A".into(),
            Some(1.0),
            vec![CellValue::Real(0.0)],
        ));

        let summary = store.apply_targeted(&plan).unwrap();
        assert_eq!(summary.rows_updated, 1);
        assert_eq!(summary.rows_inserted, 0);
        assert_eq!(store.count_rows(LDP_TABLE).unwrap(), 1);
    }

    #[test]
    fn test_targeted_update_rolls_back_on_failure() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TABLE ldp (\"Key Date\" TEXT, \"Business ID\" TEXT, \"Value\" FLOAT CHECK (\"Value\" >= 0), \"Change\" FLOAT);
                 INSERT INTO ldp VALUES ('2023-01-01', 'A', 10.0, NULL);",
            )
            .unwrap();

        let mut plan = WritePlan::new(LDP_TABLE, KeyScope::Row, vec![Column::Change]);
        plan.rows.push(OutputRow::realized(
            date(1, 1),
            "A".into(),
            Some(10.0),
            vec![CellValue::Real(7.0)],
        ));
        // No matching row, and the insert violates the CHECK constraint
        plan.rows.push(OutputRow::realized(
            date(1, 5),
            "C".into(),
            Some(-1.0),
            vec![CellValue::Real(0.0)],
        ));

        assert!(store.apply_targeted(&plan).is_err());
        assert_eq!(change_of(&store, "A", 1), None);
        assert_eq!(store.count_rows(LDP_TABLE).unwrap(), 1);
    }

    #[test]
    fn test_forecasts_require_marker_column() {
        let store = seeded_store();
        store.ensure_column(LDP_TABLE, Column::LinearPredictedValue).unwrap();

        let mut plan = WritePlan::new(
            LDP_TABLE,
            KeyScope::Row,
            vec![Column::LinearPredictedValue],
        );
        plan.rows.push(OutputRow::forecast(date(3, 31), "A".into(), vec![CellValue::Null]));

        let err = store.apply_targeted(&plan).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { .. }));
    }

    #[test]
    fn test_entity_scope_updates_every_row() {
        let store = seeded_store();
        store.ensure_column(LDP_TABLE, Column::Steigung).unwrap();

        let mut plan = WritePlan::new(LDP_TABLE, KeyScope::Entity, vec![Column::Steigung]);
        for d in [1, 2] {
            plan.rows.push(OutputRow::realized(
                date(1, d),
                "A".into(),
                None,
                vec![CellValue::Real(2.0)],
            ));
        }

        let summary = store.apply_targeted(&plan).unwrap();
        assert_eq!(summary.rows_updated, 2);

        let count: i64 = store
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM ldp WHERE \"Steigung\" = 2.0",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_forecast_rows_are_regenerated() {
        let store = seeded_store();
        store.ensure_column(LDP_TABLE, Column::LinearPredictedValue).unwrap();
        store.ensure_column(LDP_TABLE, Column::Forecast).unwrap();

        let mut plan = WritePlan::new(
            LDP_TABLE,
            KeyScope::Row,
            vec![Column::LinearPredictedValue],
        );
        plan.regenerates_forecasts = true;
        plan.rows.push(OutputRow::realized(
            date(1, 1),
            "A".into(),
            Some(10.0),
            vec![CellValue::Real(10.0)],
        ));
        plan.rows.push(OutputRow::forecast(date(3, 31), "A".into(), vec![CellValue::Real(14.0)]));

        store.apply_targeted(&plan).unwrap();
        let second = store.apply_targeted(&plan).unwrap();

        assert_eq!(second.forecast_rows_removed, 1);
        assert_eq!(second.forecast_rows, 1);
        assert_eq!(store.count_rows(LDP_TABLE).unwrap(), 4);

        // Forecast rows are invisible to the loader
        let frame = store.load_frame(LDP_TABLE, &[], NullPolicy::FillZero).unwrap();
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn test_replace_table_discards_foreign_columns() {
        let store = seeded_store();
        store.ensure_column(LDP_TABLE, Column::Volatility).unwrap();

        let mut plan = WritePlan::new(LDP_TABLE, KeyScope::Row, vec![Column::Change]);
        plan.rows.push(OutputRow::realized(
            date(1, 1),
            "A".into(),
            Some(10.0),
            vec![CellValue::Real(0.0)],
        ));

        let summary = store.replace_table(&plan).unwrap();
        assert_eq!(summary.rows_inserted, 1);
        assert_eq!(store.count_rows(LDP_TABLE).unwrap(), 1);
        assert!(!store.column_exists(LDP_TABLE, "Volatility").unwrap());
        assert!(store.column_exists(LDP_TABLE, "Forecast").unwrap());
    }
}
