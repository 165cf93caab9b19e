//! Normalizes a refresh target into {Table -> [Partition]} entries, installs
//! the refresh trace, enqueues refresh requests, commits, and evaluates
//! pre/post checks around the commit.
//!
//! Grounded in `pytabular.py`'s `Tabular.Refresh`: that method accepts the
//! same grab-bag of table names / partition names / handles / collections /
//! mappings this module's [`RefreshTarget`] models explicitly, and installs a
//! default row-count check unless told not to.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, instrument, warn};

use crate::driver::PendingOp;
use crate::error::{CheckFailure, Result, TabularError};
use crate::model::{Model, RefreshType};
use crate::trace::presets;
use crate::trace::TraceReactor;

use super::check::{RefreshCheck, RowCountCheck};

/// A refresh target, matching the original's acceptance of a table name, a
/// partition qualified by its table, a handle, a collection of the above, or
/// a `{Table -> Partition(s)}` mapping (§4.5).
pub enum RefreshTarget {
    Table(String),
    Partition(String, String),
    Many(Vec<RefreshTarget>),
    Map(HashMap<String, Vec<String>>),
}

impl RefreshTarget {
    pub fn table(name: impl Into<String>) -> Self {
        RefreshTarget::Table(name.into())
    }

    pub fn partition(table: impl Into<String>, partition: impl Into<String>) -> Self {
        RefreshTarget::Partition(table.into(), partition.into())
    }

    pub fn many(targets: Vec<RefreshTarget>) -> Self {
        RefreshTarget::Many(targets)
    }

    pub fn map(entries: HashMap<String, Vec<String>>) -> Self {
        RefreshTarget::Map(entries)
    }
}

/// Options controlling a single [`refresh`] call. `checks` and
/// `default_row_count_check` are consumed by that one call and never persist
/// on the `Model` — per Open Question (b) in SPEC_FULL.md §9, refresh-check
/// lifetime is scoped to the run that installed them, so nothing accumulates
/// across repeated refreshes of the same orchestrator caller.
pub struct RefreshOptions {
    pub kind: RefreshType,
    pub trace: bool,
    pub checks: Vec<Box<dyn RefreshCheck>>,
    pub default_row_count_check: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            kind: RefreshType::default(),
            trace: true,
            checks: Vec::new(),
            default_row_count_check: true,
        }
    }
}

/// One row of the refresh report: a partition whose `RefreshedTime` changed
/// during the commit.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshedPartition {
    pub table: String,
    pub partition: String,
    pub refreshed_time: NaiveDateTime,
}

pub type RefreshReport = Vec<RefreshedPartition>;

/// Resolves `target` against the live graph into an ordered `{table -> [partition]}`
/// list, merging repeated mentions of the same table. Fails before any server
/// work is requested if a named table or partition doesn't resolve.
fn normalize(model: &Model, target: &RefreshTarget) -> Result<Vec<(String, Vec<String>)>> {
    let mut acc: Vec<(String, Vec<String>)> = Vec::new();
    normalize_into(model, target, &mut acc)?;
    Ok(acc)
}

fn normalize_into(
    model: &Model,
    target: &RefreshTarget,
    acc: &mut Vec<(String, Vec<String>)>,
) -> Result<()> {
    match target {
        RefreshTarget::Table(name) => {
            let table = model.find_table(name)?;
            let partitions = table.partitions.iter().map(|p| p.name.clone()).collect();
            merge(acc, table.name.clone(), partitions);
        }
        RefreshTarget::Partition(table_name, partition_name) => {
            let table = model.find_table(table_name)?;
            if !table.partitions.contains_name(partition_name) {
                return Err(crate::error::not_found(
                    "Partition",
                    partition_name.clone(),
                    Some(table_name.clone()),
                ));
            }
            merge(acc, table.name.clone(), vec![partition_name.clone()]);
        }
        RefreshTarget::Many(targets) => {
            for inner in targets {
                normalize_into(model, inner, acc)?;
            }
        }
        RefreshTarget::Map(entries) => {
            for (table_name, partitions) in entries {
                let table = model.find_table(table_name)?;
                let resolved = if partitions.is_empty() {
                    table.partitions.iter().map(|p| p.name.clone()).collect()
                } else {
                    for partition_name in partitions {
                        if !table.partitions.contains_name(partition_name) {
                            return Err(crate::error::not_found(
                                "Partition",
                                partition_name.clone(),
                                Some(table_name.clone()),
                            ));
                        }
                    }
                    partitions.clone()
                };
                merge(acc, table.name.clone(), resolved);
            }
        }
    }
    Ok(())
}

fn merge(acc: &mut Vec<(String, Vec<String>)>, table: String, partitions: Vec<String>) {
    if let Some(entry) = acc.iter_mut().find(|(t, _)| *t == table) {
        for partition in partitions {
            if !entry.1.contains(&partition) {
                entry.1.push(partition);
            }
        }
    } else {
        acc.push((table, partitions));
    }
}

fn snapshot_refresh_times(model: &Model) -> HashMap<(String, String), NaiveDateTime> {
    model
        .tables
        .iter()
        .flat_map(|table| {
            table
                .partitions
                .iter()
                .map(move |p| ((table.name.clone(), p.name.clone()), p.refreshed_time))
        })
        .collect()
}

fn build_report(
    model: &Model,
    before: &HashMap<(String, String), NaiveDateTime>,
) -> RefreshReport {
    let mut report = Vec::new();
    for table in model.tables.iter() {
        for partition in table.partitions.iter() {
            let key = (table.name.clone(), partition.name.clone());
            let changed = before
                .get(&key)
                .map(|prev| *prev != partition.refreshed_time)
                .unwrap_or(true);
            if changed {
                report.push(RefreshedPartition {
                    table: table.name.clone(),
                    partition: partition.name.clone(),
                    refreshed_time: partition.refreshed_time,
                });
            }
        }
    }
    report
}

/// Creates, syncs, subscribes and starts the refresh trace. Any failure here
/// is surfaced to the caller, who treats it as non-fatal per §4.5/§7. Once
/// `create()` has installed a trace on the server, a later failure (subscribe
/// or start) tears that trace back down before returning `Err` so a failed
/// installation never leaks a live server-side trace.
async fn install_refresh_trace(model: &Model) -> Result<TraceReactor> {
    let connection = model.connection_arc();
    let name = format!("refresh-trace-{}", uuid::Uuid::new_v4());
    let mut reactor = TraceReactor::new(connection, name, presets::refresh_trace_events());
    reactor.update().await?;
    reactor.create().await?;
    if let Err(e) = reactor.subscribe(presets::refresh_trace_handler()).await {
        teardown_trace(&mut reactor).await;
        return Err(e);
    }
    if let Err(e) = reactor.start().await {
        teardown_trace(&mut reactor).await;
        return Err(e);
    }
    Ok(reactor)
}

async fn teardown_trace(trace: &mut TraceReactor) {
    if let Err(e) = trace.stop().await {
        warn!(error = %e, "failed to stop refresh trace");
    }
    if let Err(e) = trace.drop_trace().await {
        warn!(error = %e, "failed to drop refresh trace");
    }
}

/// Runs a full refresh: normalize targets, pre-check, install trace, commit,
/// post-check, report. See SPEC_FULL.md §4.5 for the exact failure semantics
/// this follows.
#[instrument(skip_all, fields(model = %model.name))]
pub async fn refresh(
    model: &mut Model,
    target: RefreshTarget,
    mut options: RefreshOptions,
) -> Result<RefreshReport> {
    let resolved = normalize(model, &target)?;

    if options.default_row_count_check {
        for (table, _) in &resolved {
            options.checks.push(Box::new(RowCountCheck::new(table.clone())));
        }
    }

    let mut pre_values = Vec::with_capacity(options.checks.len());
    for check in &options.checks {
        let pre = check.probe(model, model.connection()).await?;
        pre_values.push(pre);
    }

    let before_times = snapshot_refresh_times(model);

    let mut trace = if options.trace {
        match install_refresh_trace(model).await {
            Ok(reactor) => Some(reactor),
            Err(e) => {
                warn!(error = %e, "refresh trace construction failed; proceeding without observability");
                None
            }
        }
    } else {
        None
    };

    for (table, partitions) in &resolved {
        for partition in partitions {
            model.pending_mut().push(PendingOp::RequestRefresh {
                table: table.clone(),
                partition: partition.clone(),
                kind: options.kind,
            });
        }
    }

    debug!(tables = resolved.len(), "committing refresh request");
    let commit_result = model.commit().await;

    if let Err(e) = commit_result {
        if let Some(reactor) = trace.as_mut() {
            teardown_trace(reactor).await;
        }
        return Err(e);
    }

    let mut failures = Vec::new();
    for (check, pre) in options.checks.iter().zip(pre_values.iter()) {
        let post = check.probe(model, model.connection()).await?;
        if !check.assert(pre, &post) {
            failures.push(CheckFailure {
                name: check.name().to_string(),
                pre: pre.clone(),
                post,
            });
        }
    }

    if let Some(reactor) = trace.as_mut() {
        teardown_trace(reactor).await;
    }

    if !failures.is_empty() {
        return Err(TabularError::RefreshCheckFailure { failures });
    }

    Ok(build_report(model, &before_times))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn_string::ConnectionString;
    use crate::connection::Connection;
    use crate::driver::fake::FakeDriver;
    use crate::driver::{CellValue, RawColumn, RawModel, RawPartition, RawTable, ResultSet};
    use crate::model::{Partition, PartitionSource, Table};
    use std::sync::Arc;

    fn cs() -> ConnectionString {
        ConnectionString::parse("Data Source=localhost;Initial Catalog=Model").unwrap()
    }

    fn model_with_table(fake: FakeDriver, table: &str, partition: &str) -> Model {
        let connection = Arc::new(Connection::with_driver(cs(), Box::new(fake)));
        let mut model = Model::new("Model", connection);
        let mut t = Table::new(table);
        t.partitions.push(Partition {
            name: partition.to_string(),
            table_name: table.to_string(),
            mode: crate::model::PartitionMode::Import,
            state: crate::model::PartitionState::Ready,
            source_type: crate::model::SourceType::M,
            source: PartitionSource::MExpression(String::new()),
            refreshed_time: NaiveDateTime::UNIX_EPOCH,
            extras: Default::default(),
        });
        model.tables.push(t);
        model
    }

    #[tokio::test]
    async fn normalize_fails_fast_for_unknown_table() {
        let fake = FakeDriver::new();
        let mut model = model_with_table(fake, "Sales", "P1");
        let err = refresh(
            &mut model,
            RefreshTarget::table("NoSuchTable"),
            RefreshOptions {
                trace: false,
                default_row_count_check: false,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TabularError::NotFoundError { .. }));
    }

    #[tokio::test]
    async fn successful_refresh_reports_changed_partitions() {
        let fake = FakeDriver::new().with_response(
            "EVALUATE {COUNTROWS('Sales')}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(5)]],
            },
        );
        let later = NaiveDateTime::UNIX_EPOCH + chrono::Duration::hours(1);
        fake.set_model(RawModel {
            name: "Model".to_string(),
            tables: vec![RawTable {
                name: "Sales".to_string(),
                columns: vec![RawColumn {
                    name: "Amount".to_string(),
                    ..Default::default()
                }],
                partitions: vec![RawPartition {
                    name: "P1".to_string(),
                    refreshed_time: later,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        });
        let mut model = model_with_table(fake, "Sales", "P1");

        let report = refresh(
            &mut model,
            RefreshTarget::table("Sales"),
            RefreshOptions {
                trace: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].table, "Sales");
        assert_eq!(report[0].partition, "P1");
        assert_eq!(report[0].refreshed_time, later);
    }

    #[tokio::test]
    async fn zero_row_table_fails_the_default_row_count_check() {
        let fake = FakeDriver::new().with_response(
            "EVALUATE {COUNTROWS('Empty')}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(0)]],
            },
        );
        let mut model = model_with_table(fake, "Empty", "P1");

        let err = refresh(
            &mut model,
            RefreshTarget::table("Empty"),
            RefreshOptions {
                trace: false,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        match err {
            TabularError::RefreshCheckFailure { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].name.ends_with("Row Count"));
                assert_eq!(failures[0].post, "0");
            }
            other => panic!("expected RefreshCheckFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn commit_failure_leaves_graph_untouched_and_tears_down_trace() {
        let fake = FakeDriver::new().with_response(
            "EVALUATE {COUNTROWS('Sales')}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(5)]],
            },
        );
        fake.fail_next_commit("server rejected the batch");
        let mut model = model_with_table(fake, "Sales", "P1");

        let err = refresh(
            &mut model,
            RefreshTarget::table("Sales"),
            RefreshOptions {
                trace: false,
                default_row_count_check: false,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TabularError::CommitError { .. }));
        // the graph was never reloaded: the partition the fake driver would
        // have returned on reload ("Sales" with a later RefreshedTime) is not
        // observable here.
        assert_eq!(
            model.find_table("Sales").unwrap().partitions.by_name("P1").unwrap().refreshed_time,
            NaiveDateTime::UNIX_EPOCH
        );
    }

    #[tokio::test]
    async fn partition_target_refuses_unknown_partition_name() {
        let fake = FakeDriver::new();
        let mut model = model_with_table(fake, "Sales", "P1");
        let err = refresh(
            &mut model,
            RefreshTarget::partition("Sales", "NoSuchPartition"),
            RefreshOptions {
                trace: false,
                default_row_count_check: false,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TabularError::NotFoundError { .. }));
    }
}
