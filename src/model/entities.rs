//! Typed metadata graph entities: Table, Column, Partition, Measure, Relationship,
//! Culture, Role and their nested parts.
//!
//! Every entity carries an explicit `extras: Extras` bag for driver fields that
//! don't earn a named field (see DESIGN NOTES in SPEC_FULL.md) instead of the
//! original library's transparent attribute forwarding onto the driver object.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::collection::Named;
use super::types::{
    ColumnKind, CrossFilteringBehavior, DataType, Extras, PartitionMode, PartitionState,
    SecurityFilteringBehavior, SourceType, TranslatedProperty,
};

/// A column within a table.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub table_name: String,
    pub data_type: DataType,
    pub kind: ColumnKind,
    pub is_hidden: bool,
    pub is_key: bool,
    pub is_nullable: bool,
    pub is_available_in_mdx: bool,
    pub encoding_hint: Option<String>,
    pub display_folder: String,
    pub extras: Extras,
}

impl Named for Column {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The data or expression feeding a partition.
#[derive(Debug, Clone)]
pub enum PartitionSource {
    /// An M expression, as produced for Import-mode partitions.
    MExpression(String),
    /// A DAX expression backing a calculated table/partition.
    Calculated(String),
    /// A query string against a SQL-like relational source.
    Query(String),
}

/// A unit of data load within a table.
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub table_name: String,
    pub mode: PartitionMode,
    pub state: PartitionState,
    pub source_type: SourceType,
    pub source: PartitionSource,
    pub refreshed_time: NaiveDateTime,
    pub extras: Extras,
}

impl Named for Partition {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A DAX calculation belonging to exactly one table.
#[derive(Debug, Clone)]
pub struct Measure {
    pub name: String,
    pub table_name: String,
    pub expression: String,
    pub display_folder: String,
    pub format_string: String,
    pub is_hidden: bool,
    pub description: String,
    pub extras: Extras,
}

impl Named for Measure {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A named table, owning its columns, partitions and measures.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub is_hidden: bool,
    pub data_category: Option<String>,
    pub modified_time: NaiveDateTime,
    pub columns: super::collection::Collection<Column>,
    pub partitions: super::collection::Collection<Partition>,
    pub measures: super::collection::Collection<Measure>,
    pub extras: Extras,
}

impl Named for Table {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_hidden: false,
            data_category: None,
            modified_time: NaiveDateTime::UNIX_EPOCH,
            columns: super::collection::Collection::new(),
            partitions: super::collection::Collection::new(),
            measures: super::collection::Collection::new(),
            extras: HashMap::new(),
        }
    }
}

/// One endpoint of a `Relationship`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEndpoint {
    pub table: String,
    pub column: String,
}

/// A directed edge between two columns in two tables.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub name: String,
    pub from: RelationshipEndpoint,
    pub to: RelationshipEndpoint,
    pub is_active: bool,
    pub cross_filtering_behavior: CrossFilteringBehavior,
    pub security_filtering_behavior: SecurityFilteringBehavior,
    pub extras: Extras,
}

impl Named for Relationship {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A single translated property value within a `Culture`.
#[derive(Debug, Clone)]
pub struct ObjectTranslation {
    pub object_name: String,
    pub property: TranslatedProperty,
    pub value: String,
}

/// A locale and the translations it carries.
#[derive(Debug, Clone)]
pub struct Culture {
    pub name: String,
    pub translations: Vec<ObjectTranslation>,
    pub extras: Extras,
}

impl Named for Culture {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Per-column security applied within a `TablePermission`.
#[derive(Debug, Clone)]
pub struct ColumnPermission {
    pub column: String,
    pub metadata_permission: String,
}

/// Row-level and column-level security scoped to a single table within a `Role`.
#[derive(Debug, Clone)]
pub struct TablePermission {
    pub table: String,
    pub filter_expression: Option<String>,
    pub column_permissions: Vec<ColumnPermission>,
}

/// A named security principal.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub table_permissions: Vec<TablePermission>,
    pub extras: Extras,
}

impl Named for Role {
    fn name(&self) -> &str {
        &self.name
    }
}
