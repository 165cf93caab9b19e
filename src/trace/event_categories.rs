//! Parses the `$SYSTEM.DISCOVER_TRACE_EVENT_CATEGORIES` DMV response into an
//! `event name -> allowed column names` map.
//!
//! Each row names one traceable event and carries an embedded XML payload
//! listing the columns the server is willing to report for it; `roxmltree` is
//! used here the same way the teacher's `sqlproj_parser`/`compare::simple_xml`
//! read embedded project XML, rather than reaching for a second XML crate.

use std::collections::{HashMap, HashSet};

use crate::driver::ResultSet;

/// Walks every `<Column Name="...">` element under the row's `COLUMNS_XML`
/// cell. Malformed XML for a single row is logged and skipped rather than
/// failing the whole discovery call.
pub fn parse_event_categories(rs: &ResultSet) -> HashMap<String, HashSet<String>> {
    let mut map = HashMap::new();
    for row in &rs.rows {
        let Some(event_name) = rs.cell(row, "EVENT_NAME").map(|c| c.to_display_string()) else {
            continue;
        };
        let Some(xml) = rs.cell(row, "COLUMNS_XML").map(|c| c.to_display_string()) else {
            continue;
        };
        let columns = match roxmltree::Document::parse(&xml) {
            Ok(doc) => doc
                .descendants()
                .filter(|n| n.has_tag_name("Column"))
                .filter_map(|n| n.attribute("Name").map(str::to_string))
                .collect::<HashSet<_>>(),
            Err(e) => {
                tracing::warn!(event = %event_name, error = %e, "failed to parse trace event columns XML");
                continue;
            }
        };
        map.entry(event_name).or_insert_with(HashSet::new).extend(columns);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CellValue;

    #[test]
    fn parses_allowed_columns_per_event() {
        let rs = ResultSet {
            columns: vec!["EVENT_NAME".into(), "COLUMNS_XML".into()],
            rows: vec![vec![
                CellValue::String("ProgressReportEnd".into()),
                CellValue::String(
                    "<Columns><Column Name=\"Duration\"/><Column Name=\"ObjectName\"/></Columns>"
                        .into(),
                ),
            ]],
        };
        let map = parse_event_categories(&rs);
        let columns = &map["ProgressReportEnd"];
        assert!(columns.contains("Duration"));
        assert!(columns.contains("ObjectName"));
    }

    #[test]
    fn malformed_xml_is_skipped_not_fatal() {
        let rs = ResultSet {
            columns: vec!["EVENT_NAME".into(), "COLUMNS_XML".into()],
            rows: vec![vec![
                CellValue::String("Broken".into()),
                CellValue::String("<Columns><Column".into()),
            ]],
        };
        let map = parse_event_categories(&rs);
        assert!(map.is_empty());
    }
}
