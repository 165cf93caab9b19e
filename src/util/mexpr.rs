//! M-expression generation for `Create_Table`-style literal-data partitions.
//!
//! Per the table-from-literal-data operation (§4.3): a Rust value is mapped to
//! an M type (`boolean -> Boolean`, `signed/unsigned integer -> Int64`,
//! `float/complex -> Double`, `datetime -> DateTime`, everything else
//! `-> String`) and the whole literal is rendered as a `#table({...}, {{...}})`
//! constructor wrapped in `let Source = ... in Source`, the shape a standalone
//! M query needs (and the same `let`/`in` wrapper `logic_utils.py`'s
//! `generate_xmla` used around its own `#table` literal).

use crate::driver::CellValue;

/// The M type a [`CellValue`] is mapped to when synthesizing a literal table.
pub fn infer_m_type(value: &CellValue) -> &'static str {
    match value {
        CellValue::Bool(_) => "Boolean",
        CellValue::Int(_) => "Int64.Type",
        CellValue::Double(_) => "type number",
        CellValue::DateTime(_) => "type datetime",
        CellValue::Null | CellValue::String(_) => "type text",
    }
}

fn escape_m_string(value: &str) -> String {
    value.replace('"', "\"\"")
}

/// Renders a single cell as a quoted M string literal, regardless of its
/// source type. Per the table-from-literal-data operation, every cell is
/// embedded as a quoted string — non-string cells round-trip as strings
/// unless the M expression is cast server-side after creation.
pub fn m_literal(value: &CellValue) -> String {
    format!("\"{}\"", escape_m_string(&value.to_display_string()))
}

/// Builds a `let Source = #table({col, ...}, {{v, ...}, ...}) in Source` M
/// expression for a literal in-memory table, as used by the
/// create-table-from-tabular-literal operation. The `let`/`in` wrapper makes
/// this a valid standalone M query rather than a bare constructor.
pub fn build_table_literal(columns: &[String], rows: &[Vec<CellValue>]) -> String {
    let column_list = columns
        .iter()
        .map(|c| format!("\"{}\"", escape_m_string(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let row_list = rows
        .iter()
        .map(|row| {
            let cells = row.iter().map(m_literal).collect::<Vec<_>>().join(", ");
            format!("{{{cells}}}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("let\nSource = #table({{{column_list}}}, {{{row_list}}})\nin\nSource")
}
