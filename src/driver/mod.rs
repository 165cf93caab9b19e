//! The opaque driver boundary
//!
//! The spec treats the wire protocol (XMLA/TDS) as a non-goal: the core assumes a
//! lower-level driver exposing connect/execute primitives, plus a handful of
//! higher-level capabilities (§6: install/start/stop/drop trace, iterate model
//! metadata, request refresh, save changes). `ServerDriver` is that whole boundary.
//! The one real implementation (`tiberius_driver`) drives a TDS connection with
//! `tiberius`, the same crate the teacher's own end-to-end tests use to talk to a
//! live server. A `fake` implementation backs the unit/integration test suite.

pub mod fake;
pub mod tiberius_driver;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, TabularError};

/// A single returned cell, already coerced away from driver-native wire types.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(chrono::NaiveDateTime),
}

impl CellValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(v) => Some(*v),
            CellValue::Double(v) => Some(*v as i64),
            CellValue::Null => Some(0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Null) || matches!(self, CellValue::String(s) if s.is_empty())
    }

    /// A display form suitable for `CheckFailure`/`ChangeSet` pre/post strings.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Null => "null".to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Int(v) => v.to_string(),
            CellValue::Double(v) => v.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::DateTime(dt) => dt.to_string(),
        }
    }
}

/// A row is a positional list of cells; `ResultSet::columns` gives their names.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    /// Single-row, single-column results coerce to a bare scalar per the spec.
    pub fn into_scalar_or_table(self) -> QueryOutcome {
        if self.rows.len() == 1 && self.columns.len() == 1 {
            let mut rows = self.rows;
            QueryOutcome::Scalar(rows.remove(0).into_iter().next().unwrap_or(CellValue::Null))
        } else {
            QueryOutcome::Table(self)
        }
    }

    /// Index of a named column, case-insensitive (DMV column names are conventionally
    /// shouted, e.g. `TABLE_ID`, but this keeps the lookup forgiving).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn cell(&self, row: &[CellValue], name: &str) -> Option<CellValue> {
        self.column_index(name).and_then(|i| row.get(i)).cloned()
    }
}

/// The coerced result of `Connection::execute`
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Scalar(CellValue),
    Table(ResultSet),
}

impl QueryOutcome {
    pub fn into_table(self) -> ResultSet {
        match self {
            QueryOutcome::Table(t) => t,
            QueryOutcome::Scalar(v) => ResultSet {
                columns: vec!["Value".to_string()],
                rows: vec![vec![v]],
            },
        }
    }

    pub fn as_scalar(&self) -> Option<&CellValue> {
        match self {
            QueryOutcome::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata iteration ("iterate Model metadata" in §6)
// ---------------------------------------------------------------------------

/// Plain-data mirror of [`crate::model::entities::Column`], decoupled from the
/// model crate so the driver boundary doesn't depend on it.
#[derive(Debug, Clone, Default)]
pub struct RawColumn {
    pub name: String,
    pub data_type: String,
    pub kind: String,
    pub is_hidden: bool,
    pub is_key: bool,
    pub is_nullable: bool,
    pub is_available_in_mdx: bool,
    pub encoding_hint: Option<String>,
    pub display_folder: String,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawPartition {
    pub name: String,
    pub mode: String,
    pub state: String,
    pub source_type: String,
    pub source: String,
    pub refreshed_time: chrono::NaiveDateTime,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawMeasure {
    pub name: String,
    pub expression: String,
    pub display_folder: String,
    pub format_string: String,
    pub is_hidden: bool,
    pub description: String,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub name: String,
    pub is_hidden: bool,
    pub data_category: Option<String>,
    pub modified_time: chrono::NaiveDateTime,
    pub columns: Vec<RawColumn>,
    pub partitions: Vec<RawPartition>,
    pub measures: Vec<RawMeasure>,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawRelationship {
    pub name: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub is_active: bool,
    pub cross_filtering_behavior: String,
    pub security_filtering_behavior: String,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawObjectTranslation {
    pub object_name: String,
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct RawCulture {
    pub name: String,
    pub translations: Vec<RawObjectTranslation>,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawColumnPermission {
    pub column: String,
    pub metadata_permission: String,
}

#[derive(Debug, Clone, Default)]
pub struct RawTablePermission {
    pub table: String,
    pub filter_expression: Option<String>,
    pub column_permissions: Vec<RawColumnPermission>,
}

#[derive(Debug, Clone, Default)]
pub struct RawRole {
    pub name: String,
    pub table_permissions: Vec<RawTablePermission>,
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawModel {
    pub name: String,
    pub tables: Vec<RawTable>,
    pub relationships: Vec<RawRelationship>,
    pub cultures: Vec<RawCulture>,
    pub roles: Vec<RawRole>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RawDatabaseInfo {
    pub estimated_size: u64,
    pub compatibility_level: u32,
}

// ---------------------------------------------------------------------------
// Change committer ("save changes", "enumerate and parse change impact")
// ---------------------------------------------------------------------------

/// A single queued mutation, passed opaquely from the model layer down to
/// `ServerDriver::save_changes`.
#[derive(Debug, Clone)]
pub enum PendingOp {
    SetProperty {
        object_kind: &'static str,
        object_name: String,
        parent_name: Option<String>,
        property_name: String,
        new_value: String,
    },
    AddMeasure {
        table: String,
        name: String,
        expression: String,
        properties: Vec<(String, String)>,
    },
    AddTable {
        name: String,
        columns: Vec<(String, String)>,
        m_expression: String,
    },
    RemoveObject {
        object_kind: &'static str,
        object_name: String,
        parent_name: Option<String>,
    },
    RequestRefresh {
        table: String,
        partition: String,
        kind: RefreshKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshKind {
    #[default]
    Full,
    ClearValues,
    Calculate,
    DataOnly,
    Automatic,
    Defrag,
}

#[derive(Debug, Clone)]
pub struct PropertyChangeRecord {
    pub object_kind: &'static str,
    pub object_name: String,
    pub parent_name: Option<String>,
    pub property_name: String,
    pub new_value: String,
    pub original_value: Option<String>,
}

/// Everything the server reports back from a `save_changes` round-trip.
#[derive(Debug, Clone, Default)]
pub struct RawChangeSet {
    pub property_changes: Vec<PropertyChangeRecord>,
    pub added_objects: Vec<String>,
    pub added_subtree_roots: Vec<String>,
    pub removed_objects: Vec<String>,
    pub removed_subtree_roots: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl RawChangeSet {
    pub fn is_empty(&self) -> bool {
        self.property_changes.is_empty()
            && self.added_objects.is_empty()
            && self.added_subtree_roots.is_empty()
            && self.removed_objects.is_empty()
            && self.removed_subtree_roots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Trace reactor ("install/start/stop/drop trace")
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TraceEventSpec {
    pub event_name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TraceHandle {
    pub name: String,
    pub id: String,
}

/// A single dispatched trace event, already flattened to named columns.
#[derive(Debug, Clone)]
pub struct RawTraceEvent {
    pub event_name: String,
    pub columns: HashMap<String, CellValue>,
}

pub type TraceEventHandler = Arc<dyn Fn(RawTraceEvent) + Send + Sync>;

/// Minimal contract the model-interaction runtime needs from the underlying driver.
/// Real deployments implement this over XMLA/TDS; the core never speaks the wire
/// protocol directly.
#[async_trait]
pub trait ServerDriver: Send + Sync {
    /// Execute a DAX/MDX/DMV statement and return its raw result set.
    async fn execute(&self, statement: &str) -> Result<ResultSet>;

    /// Open (or reuse) a session impersonating `effective_user`. Implementations
    /// that cannot impersonate should still accept the call and scope subsequent
    /// `execute` calls on the returned handle accordingly.
    async fn open_as(&self, effective_user: &str) -> Result<Box<dyn ServerDriver>>;

    /// Whether the underlying session is currently connected.
    async fn is_connected(&self) -> bool;

    /// Reconnect a dropped session.
    async fn reconnect(&self) -> Result<()>;

    /// Close the session; a subsequent `reconnect` must succeed.
    async fn disconnect(&self) -> Result<()>;

    /// Iterate the full model metadata graph in one round-trip.
    async fn fetch_model(&self) -> Result<RawModel>;

    async fn fetch_database_info(&self, catalog: &str) -> Result<RawDatabaseInfo>;

    /// Apply queued mutations as a single server-side transaction.
    async fn save_changes(&self, ops: &[PendingOp]) -> Result<RawChangeSet>;

    async fn create_trace(&self, name: &str, events: &[TraceEventSpec]) -> Result<TraceHandle>;
    async fn start_trace(&self, trace: &TraceHandle) -> Result<()>;
    async fn stop_trace(&self, trace: &TraceHandle) -> Result<()>;
    async fn drop_trace(&self, trace: &TraceHandle) -> Result<()>;

    /// Registers `handler` to be invoked for every event the server emits on
    /// `trace`. Per §5, the driver may invoke it from any internal thread/task;
    /// the handler type is `Send + Sync` for exactly that reason.
    async fn subscribe(&self, trace: &TraceHandle, handler: TraceEventHandler) -> Result<()>;
}

pub(crate) fn connect_error(message: impl Into<String>) -> TabularError {
    TabularError::ConnectError {
        message: message.into(),
    }
}
