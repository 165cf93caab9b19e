//! TMSL-ish command synthesis for the change committer and trace lifecycle.
//!
//! The exact Tabular Model Scripting Language grammar is out of scope (§1
//! Non-goals name the wire format explicitly); these functions synthesize
//! commands that are *shaped* like TMSL/XMLA so a real driver swap only has to
//! replace this module, not the callers.

use crate::driver::{PendingOp, PropertyChangeRecord, RawChangeSet, ResultSet, TraceEventSpec};

fn quote(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

fn qualify(object_kind: &str, object_name: &str, parent_name: Option<&str>) -> String {
    match parent_name {
        Some(parent) => format!("{}.{}.{}", quote(parent), object_kind, quote(object_name)),
        None => format!("{}.{}", object_kind, quote(object_name)),
    }
}

/// Renders the queued operations as one semicolon-joined script, in the order
/// they were recorded. Each statement is self-contained so a partially-applied
/// batch still leaves the model in a describable state.
pub fn build_commit_script(ops: &[PendingOp]) -> String {
    ops.iter()
        .map(render_op)
        .collect::<Vec<_>>()
        .join(";\n")
}

fn render_op(op: &PendingOp) -> String {
    match op {
        PendingOp::SetProperty {
            object_kind,
            object_name,
            parent_name,
            property_name,
            new_value,
        } => format!(
            "ALTER {} SET {} = '{}'",
            qualify(object_kind, object_name, parent_name.as_deref()),
            property_name,
            new_value.replace('\'', "''")
        ),
        PendingOp::AddMeasure {
            table,
            name,
            expression,
            properties,
        } => {
            let extra: String = properties
                .iter()
                .map(|(k, v)| format!(", {k} = '{}'", v.replace('\'', "''")))
                .collect();
            format!(
                "CREATE MEASURE {}.{} = {}{}",
                quote(table),
                quote(name),
                expression,
                extra
            )
        }
        PendingOp::AddTable {
            name,
            columns,
            m_expression,
        } => {
            let cols: String = columns
                .iter()
                .map(|(col, ty)| format!("{} {}", quote(col), ty))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "CREATE TABLE {} ({}) SOURCE = {}",
                quote(name),
                cols,
                m_expression
            )
        }
        PendingOp::RemoveObject {
            object_kind,
            object_name,
            parent_name,
        } => format!(
            "DROP {}",
            qualify(object_kind, object_name, parent_name.as_deref())
        ),
        PendingOp::RequestRefresh {
            table,
            partition,
            kind,
        } => format!(
            "REFRESH {:?} {}.{}",
            kind,
            quote(table),
            quote(partition)
        ),
    }
}

/// Turns the server's (opaque) response to a commit script back into a
/// structured [`RawChangeSet`]. Without a real XMLA transaction log to parse,
/// this reflects back exactly the operations that were sent — a property
/// change round-trips as applied, an add/remove round-trips as the object
/// name it touched — plus whatever free-form diagnostic rows the server
/// returned (e.g. warnings surfaced as a single-column result set).
pub fn parse_change_set(ops: &[PendingOp], response: &ResultSet) -> RawChangeSet {
    let mut change_set = RawChangeSet::default();
    for op in ops {
        match op {
            PendingOp::SetProperty {
                object_kind,
                object_name,
                parent_name,
                property_name,
                new_value,
            } => change_set.property_changes.push(PropertyChangeRecord {
                object_kind,
                object_name: object_name.clone(),
                parent_name: parent_name.clone(),
                property_name: property_name.clone(),
                new_value: new_value.clone(),
                original_value: None,
            }),
            PendingOp::AddMeasure { table, name, .. } => change_set
                .added_objects
                .push(format!("{table}.{name}")),
            PendingOp::AddTable { name, .. } => {
                change_set.added_objects.push(name.clone());
                change_set.added_subtree_roots.push(name.clone());
            }
            PendingOp::RemoveObject {
                object_name,
                parent_name,
                ..
            } => {
                let qualified = match parent_name {
                    Some(p) => format!("{p}.{object_name}"),
                    None => object_name.clone(),
                };
                change_set.removed_objects.push(qualified.clone());
                change_set.removed_subtree_roots.push(qualified);
            }
            PendingOp::RequestRefresh { .. } => {}
        }
    }
    change_set.diagnostics = response
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|c| c.to_display_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect();
    change_set
}

/// Builds the `CREATE TRACE` statement used to install a trace subscription,
/// mirroring the shape of a SQL Server Profiler trace definition: one row per
/// (event, column) pair the caller asked to observe.
pub fn build_create_trace_script(name: &str, id: &str, events: &[TraceEventSpec]) -> String {
    let event_list = events
        .iter()
        .map(|spec| {
            format!(
                "{} ({})",
                spec.event_name,
                spec.columns.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TRACE {} WITH ID = '{}' EVENTS ({})",
        quote(name),
        id,
        event_list
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_property_renders_alter_statement() {
        let ops = vec![PendingOp::SetProperty {
            object_kind: "Measure",
            object_name: "Total Sales".to_string(),
            parent_name: Some("Sales".to_string()),
            property_name: "FormatString".to_string(),
            new_value: "$#,##0".to_string(),
        }];
        let script = build_commit_script(&ops);
        assert!(script.starts_with("ALTER [Sales].Measure"));
        assert!(script.contains("FormatString = '$#,##0'"));
    }

    #[test]
    fn parse_change_set_reflects_added_table() {
        let ops = vec![PendingOp::AddTable {
            name: "Budget".to_string(),
            columns: vec![("Amount".to_string(), "Double".to_string())],
            m_expression: "#table({\"Amount\"}, {{1.0}})".to_string(),
        }];
        let response = ResultSet::default();
        let change_set = parse_change_set(&ops, &response);
        assert_eq!(change_set.added_objects, vec!["Budget".to_string()]);
        assert_eq!(change_set.added_subtree_roots, vec!["Budget".to_string()]);
    }

    #[test]
    fn create_trace_script_lists_events() {
        let events = vec![TraceEventSpec {
            event_name: "ProgressReportEnd".to_string(),
            columns: vec!["ObjectName".to_string(), "Duration".to_string()],
        }];
        let script = build_create_trace_script("refresh-trace", "abc-123", &events);
        assert!(script.contains("ProgressReportEnd (ObjectName, Duration)"));
        assert!(script.contains("WITH ID = 'abc-123'"));
    }
}
