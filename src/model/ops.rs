//! Operations on the metadata graph: row counts, sample values, dependency
//! lookups, measure upsert and table-from-literal-data creation, plus the
//! row-count/refresh-time rollup helpers supplemented from the original
//! library's `basic_checks.py`.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::connection::Connection;
use crate::driver::{CellValue, PendingOp, ResultSet};
use crate::error::{Result, TabularError};

use super::entities::{Column, Measure, Partition, PartitionSource, Table};
use super::graph::Model;
use super::types::{ColumnKind, DataType, PartitionMode, PartitionState, SourceType};

fn quote_table(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

fn quote_column(table: &str, column: &str) -> String {
    format!("{}[{}]", quote_table(table), column)
}

impl Table {
    /// `EVALUATE {COUNTROWS('T')}`; a blank/null result (which COUNTROWS never
    /// actually produces, but DAX scalars are nullable in general) surfaces as 0.
    pub async fn row_count(&self, connection: &Connection) -> Result<i64> {
        let dax = format!("EVALUATE {{COUNTROWS({})}}", quote_table(&self.name));
        let outcome = connection.execute(&dax, None).await?;
        Ok(outcome.as_scalar().and_then(|c| c.as_i64()).unwrap_or(0))
    }
}

impl Column {
    /// Up to `n` non-blank, non-empty values in ascending order. Tries a
    /// `TOPNSKIP`-based query first; DirectQuery sources that reject it fall
    /// back to a `TOPN`/`FILTER` form.
    pub async fn get_sample_values(&self, connection: &Connection, n: usize) -> Result<Vec<String>> {
        let col = quote_column(&self.table_name, &self.name);
        let primary = format!("EVALUATE TOPNSKIP({n}, 0, DISTINCT({col}), {col}, ASC)");
        let result = match connection.execute(&primary, None).await {
            Ok(outcome) => outcome.into_table(),
            Err(_) => {
                let fallback = format!(
                    "EVALUATE TOPN({n}, FILTER(VALUES({col}), NOT ISBLANK({col}) && LEN({col}) > 0), {col}, ASC)"
                );
                connection.execute(&fallback, None).await?.into_table()
            }
        };
        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|cell| !cell.is_blank())
            .map(|cell| cell.to_display_string())
            .take(n)
            .collect())
    }

    pub async fn distinct_count(&self, connection: &Connection, exclude_blank: bool) -> Result<i64> {
        let col = quote_column(&self.table_name, &self.name);
        let func = if exclude_blank { "DISTINCTCOUNTNOBLANK" } else { "DISTINCTCOUNT" };
        let dax = format!("EVALUATE {{{func}({col})}}");
        let outcome = connection.execute(&dax, None).await?;
        Ok(outcome.as_scalar().and_then(|c| c.as_i64()).unwrap_or(0))
    }

    pub async fn dependencies(&self, connection: &Connection) -> Result<ResultSet> {
        object_dependencies(connection, &self.name, &self.table_name).await
    }
}

impl Measure {
    pub async fn dependencies(&self, connection: &Connection) -> Result<ResultSet> {
        object_dependencies(connection, &self.name, &self.table_name).await
    }
}

async fn object_dependencies(connection: &Connection, object: &str, parent_table: &str) -> Result<ResultSet> {
    let dmv = format!(
        "SELECT * FROM $SYSTEM.DISCOVER_CALC_DEPENDENCY WHERE [OBJECT] = '{}' AND [TABLE] = '{}'",
        object.replace('\'', "''"),
        parent_table.replace('\'', "''")
    );
    Ok(connection.execute(&dmv, None).await?.into_table())
}

const KNOWN_MEASURE_PROPERTIES: &[&str] =
    &["DisplayFolder", "FormatString", "IsHidden", "Description", "KPI"];

fn apply_measure_property(measure: &mut Measure, key: &str, value: &str) -> Result<()> {
    match key {
        "DisplayFolder" => measure.display_folder = value.to_string(),
        "FormatString" => measure.format_string = value.to_string(),
        "IsHidden" => measure.is_hidden = value.eq_ignore_ascii_case("true"),
        "Description" => measure.description = value.to_string(),
        "KPI" => {
            measure.extras.insert("KPI".to_string(), value.to_string());
        }
        other => {
            return Err(TabularError::InvalidPropertyError {
                object_kind: "Measure",
                property: other.to_string(),
            })
        }
    }
    Ok(())
}

/// Locates an existing measure by name in `table`; if found, overwrites its
/// expression and any supplied properties. Otherwise constructs a new measure,
/// attaches it to the table, and commits immediately.
pub async fn upsert_measure(
    model: &mut Model,
    table: &str,
    name: &str,
    expression: &str,
    properties: &[(String, String)],
) -> Result<()> {
    for (key, _) in properties {
        if !KNOWN_MEASURE_PROPERTIES.contains(&key.as_str()) {
            return Err(TabularError::InvalidPropertyError {
                object_kind: "Measure",
                property: key.clone(),
            });
        }
    }

    let exists = model.find_table(table)?.measures.contains_name(name);

    if exists {
        let target = model.find_table_mut(table)?;
        let measure = target.measures.by_name_mut(name).expect("checked above");
        measure.expression = expression.to_string();
        for (key, value) in properties {
            apply_measure_property(measure, key, value)?;
        }
        model.pending_mut().push(PendingOp::SetProperty {
            object_kind: "Measure",
            object_name: name.to_string(),
            parent_name: Some(table.to_string()),
            property_name: "Expression".to_string(),
            new_value: expression.to_string(),
        });
        for (key, value) in properties {
            model.pending_mut().push(PendingOp::SetProperty {
                object_kind: "Measure",
                object_name: name.to_string(),
                parent_name: Some(table.to_string()),
                property_name: key.clone(),
                new_value: value.clone(),
            });
        }
    } else {
        let mut measure = Measure {
            name: name.to_string(),
            table_name: table.to_string(),
            expression: expression.to_string(),
            display_folder: String::new(),
            format_string: String::new(),
            is_hidden: false,
            description: String::new(),
            extras: HashMap::new(),
        };
        for (key, value) in properties {
            apply_measure_property(&mut measure, key, value)?;
        }
        model.find_table_mut(table)?.measures.push(measure);
        model.pending_mut().push(PendingOp::AddMeasure {
            table: table.to_string(),
            name: name.to_string(),
            expression: expression.to_string(),
            properties: properties.to_vec(),
        });
    }

    model.commit().await?;
    Ok(())
}

fn infer_data_type(value: &CellValue) -> DataType {
    match value {
        CellValue::Bool(_) => DataType::Boolean,
        CellValue::Int(_) => DataType::Int64,
        CellValue::Double(_) => DataType::Double,
        CellValue::DateTime(_) => DataType::DateTime,
        CellValue::Null | CellValue::String(_) => DataType::String,
    }
}

/// Generates a single M-expression partition and column schema for a columnar
/// literal dataset (e.g. `{"col1": [1,2,3], "col2": ["four","five","six"]}`),
/// adds it to the graph as a new table, and commits immediately.
pub async fn create_table_from_literal(
    model: &mut Model,
    name: &str,
    columns: Vec<(String, Vec<CellValue>)>,
) -> Result<()> {
    let row_count = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    let column_names: Vec<String> = columns.iter().map(|(n, _)| n.clone()).collect();
    let rows: Vec<Vec<CellValue>> = (0..row_count)
        .map(|i| {
            columns
                .iter()
                .map(|(_, values)| values.get(i).cloned().unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();
    let m_expression = crate::util::mexpr::build_table_literal(&column_names, &rows);

    let mut table = Table::new(name);
    let mut schema = Vec::with_capacity(columns.len());
    for (col_name, values) in &columns {
        let sample = values.iter().find(|v| !matches!(v, CellValue::Null)).unwrap_or(&CellValue::Null);
        table.columns.push(Column {
            name: col_name.clone(),
            table_name: name.to_string(),
            data_type: infer_data_type(sample),
            kind: ColumnKind::Data,
            is_hidden: false,
            is_key: false,
            is_nullable: true,
            is_available_in_mdx: true,
            encoding_hint: None,
            display_folder: String::new(),
            extras: HashMap::new(),
        });
        schema.push((col_name.clone(), crate::util::mexpr::infer_m_type(sample).to_string()));
    }
    table.partitions.push(Partition {
        name: format!("{name}-Partition"),
        table_name: name.to_string(),
        mode: PartitionMode::Import,
        state: PartitionState::Ready,
        source_type: SourceType::M,
        source: PartitionSource::MExpression(m_expression.clone()),
        refreshed_time: NaiveDateTime::UNIX_EPOCH,
        extras: HashMap::new(),
    });

    model.tables.push(table);
    model.pending_mut().push(PendingOp::AddTable {
        name: name.to_string(),
        columns: schema,
        m_expression,
    });
    model.commit().await?;
    Ok(())
}

/// Removes `table` from the graph and commits immediately. Per §3's lifecycle
/// ("destruction happens via explicit remove followed by commit"), the table
/// must already exist; a commit that reaches the server removes it there too,
/// and the subsequent reload leaves it unresolvable by name.
pub async fn remove_table(model: &mut Model, table: &str) -> Result<()> {
    model.find_table(table)?;
    model.tables.remove(table);
    model.pending_mut().push(PendingOp::RemoveObject {
        object_kind: "Table",
        object_name: table.to_string(),
        parent_name: None,
    });
    model.commit().await?;
    Ok(())
}

/// Removes `name` from `table`'s measures and commits immediately.
pub async fn remove_measure(model: &mut Model, table: &str, name: &str) -> Result<()> {
    let target = model.find_table_mut(table)?;
    if target.measures.remove(name).is_none() {
        return Err(crate::error::not_found("Measure", name, Some(table.to_string())));
    }
    model.pending_mut().push(PendingOp::RemoveObject {
        object_kind: "Measure",
        object_name: name.to_string(),
        parent_name: Some(table.to_string()),
    });
    model.commit().await?;
    Ok(())
}

/// Whether a `Process` job is currently running on the server, per
/// `$SYSTEM.DISCOVER_JOBS`. Used by callers that want to avoid enqueuing a
/// refresh while one is already in flight.
pub async fn refresh_in_progress(connection: &Connection) -> Result<bool> {
    let rs = connection
        .execute("SELECT * FROM $SYSTEM.DISCOVER_JOBS", None)
        .await?
        .into_table();
    Ok(rs.rows.iter().any(|row| {
        rs.cell(row, "JOB_DESCRIPTION")
            .map(|c| c.to_display_string() == "Process")
            .unwrap_or(false)
    }))
}

/// Names of tables whose `row_count()` is zero, per `basic_checks.py`'s helper
/// of the same intent.
pub async fn zero_row_tables(model: &Model, connection: &Connection) -> Result<Vec<String>> {
    let mut zero = Vec::new();
    for table in model.tables.iter() {
        if table.row_count(connection).await? == 0 {
            zero.push(table.name.clone());
        }
    }
    Ok(zero)
}

/// Per table (or per partition when `group_by_table` is false), the max
/// `RefreshedTime` across its partitions — already loaded on the in-memory
/// graph, so no server round-trip is needed.
pub fn table_last_refresh_times(model: &Model, group_by_table: bool) -> HashMap<String, NaiveDateTime> {
    let mut result = HashMap::new();
    for table in model.tables.iter() {
        if table.partitions.is_empty() {
            warn!(table = %table.name, "table has no partitions; skipping refresh-time rollup");
            continue;
        }
        if group_by_table {
            let latest = table
                .partitions
                .iter()
                .map(|p| p.refreshed_time)
                .max()
                .unwrap_or(NaiveDateTime::UNIX_EPOCH);
            result.insert(table.name.clone(), latest);
        } else {
            for partition in table.partitions.iter() {
                result.insert(format!("{}.{}", table.name, partition.name), partition.refreshed_time);
            }
        }
    }
    result
}
