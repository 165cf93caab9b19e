//! Assembles a [`RawModel`] from the `$SYSTEM.TMSCHEMA_*` DMV result sets.
//!
//! Real Analysis Services TMSCHEMA DMVs key children to parents by numeric ID
//! (`TableID`, `ColumnID`, ...); this rendition joins by name instead, since the
//! wire protocol itself is out of scope (§1 Non-goals) and sibling names are
//! already guaranteed unique by the graph's own invariants (§3).

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::driver::{
    CellValue, RawColumn, RawColumnPermission, RawCulture, RawMeasure, RawModel,
    RawObjectTranslation, RawPartition, RawRelationship, RawRole, RawTable, RawTablePermission,
    ResultSet,
};

fn str_cell(rs: &ResultSet, row: &[CellValue], name: &str) -> String {
    rs.cell(row, name)
        .map(|c| c.to_display_string())
        .unwrap_or_default()
}

fn opt_str_cell(rs: &ResultSet, row: &[CellValue], name: &str) -> Option<String> {
    match rs.cell(row, name) {
        Some(CellValue::Null) | None => None,
        Some(c) => Some(c.to_display_string()),
    }
}

fn bool_cell(rs: &ResultSet, row: &[CellValue], name: &str) -> bool {
    matches!(
        rs.cell(row, name),
        Some(CellValue::Bool(true)) | Some(CellValue::Int(1))
    )
}

fn datetime_cell(rs: &ResultSet, row: &[CellValue], name: &str) -> NaiveDateTime {
    match rs.cell(row, name) {
        Some(CellValue::DateTime(dt)) => dt,
        _ => NaiveDateTime::UNIX_EPOCH,
    }
}

fn extras_from_row(rs: &ResultSet, row: &[CellValue], known: &[&str]) -> HashMap<String, String> {
    rs.columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !known.iter().any(|k| k.eq_ignore_ascii_case(name)))
        .filter_map(|(i, name)| row.get(i).map(|c| (name.clone(), c.to_display_string())))
        .collect()
}

const TABLE_COLS: &[&str] = &["TableName", "IsHidden", "DataCategory", "ModifiedTime"];
const COLUMN_COLS: &[&str] = &[
    "TableName",
    "ExplicitName",
    "ExplicitDataType",
    "ColumnType",
    "IsHidden",
    "IsKey",
    "IsNullable",
    "IsAvailableInMDX",
    "EncodingHint",
    "DisplayFolder",
];
const PARTITION_COLS: &[&str] = &[
    "TableName",
    "PartitionName",
    "Mode",
    "State",
    "SourceType",
    "Source",
    "RefreshedTime",
];
const MEASURE_COLS: &[&str] = &[
    "TableName",
    "MeasureName",
    "Expression",
    "DisplayFolder",
    "FormatString",
    "IsHidden",
    "Description",
];
const RELATIONSHIP_COLS: &[&str] = &[
    "RelationshipName",
    "FromTable",
    "FromColumn",
    "ToTable",
    "ToColumn",
    "IsActive",
    "CrossFilteringBehavior",
    "SecurityFilteringBehavior",
];

pub fn assemble_raw_model(
    tables_rs: &ResultSet,
    columns_rs: &ResultSet,
    partitions_rs: &ResultSet,
    measures_rs: &ResultSet,
    relationships_rs: &ResultSet,
    cultures_rs: &ResultSet,
    translations_rs: &ResultSet,
    roles_rs: &ResultSet,
    table_perms_rs: &ResultSet,
    column_perms_rs: &ResultSet,
) -> RawModel {
    let mut tables: Vec<RawTable> = tables_rs
        .rows
        .iter()
        .map(|row| RawTable {
            name: str_cell(tables_rs, row, "TableName"),
            is_hidden: bool_cell(tables_rs, row, "IsHidden"),
            data_category: opt_str_cell(tables_rs, row, "DataCategory"),
            modified_time: datetime_cell(tables_rs, row, "ModifiedTime"),
            columns: Vec::new(),
            partitions: Vec::new(),
            measures: Vec::new(),
            extras: extras_from_row(tables_rs, row, TABLE_COLS),
        })
        .collect();

    for row in &columns_rs.rows {
        let table_name = str_cell(columns_rs, row, "TableName");
        if let Some(table) = tables.iter_mut().find(|t| t.name == table_name) {
            table.columns.push(RawColumn {
                name: str_cell(columns_rs, row, "ExplicitName"),
                data_type: str_cell(columns_rs, row, "ExplicitDataType"),
                kind: str_cell(columns_rs, row, "ColumnType"),
                is_hidden: bool_cell(columns_rs, row, "IsHidden"),
                is_key: bool_cell(columns_rs, row, "IsKey"),
                is_nullable: bool_cell(columns_rs, row, "IsNullable"),
                is_available_in_mdx: bool_cell(columns_rs, row, "IsAvailableInMDX"),
                encoding_hint: opt_str_cell(columns_rs, row, "EncodingHint"),
                display_folder: str_cell(columns_rs, row, "DisplayFolder"),
                extras: extras_from_row(columns_rs, row, COLUMN_COLS),
            });
        }
    }

    for row in &partitions_rs.rows {
        let table_name = str_cell(partitions_rs, row, "TableName");
        if let Some(table) = tables.iter_mut().find(|t| t.name == table_name) {
            table.partitions.push(RawPartition {
                name: str_cell(partitions_rs, row, "PartitionName"),
                mode: str_cell(partitions_rs, row, "Mode"),
                state: str_cell(partitions_rs, row, "State"),
                source_type: str_cell(partitions_rs, row, "SourceType"),
                source: str_cell(partitions_rs, row, "Source"),
                refreshed_time: datetime_cell(partitions_rs, row, "RefreshedTime"),
                extras: extras_from_row(partitions_rs, row, PARTITION_COLS),
            });
        }
    }

    for row in &measures_rs.rows {
        let table_name = str_cell(measures_rs, row, "TableName");
        if let Some(table) = tables.iter_mut().find(|t| t.name == table_name) {
            table.measures.push(RawMeasure {
                name: str_cell(measures_rs, row, "MeasureName"),
                expression: str_cell(measures_rs, row, "Expression"),
                display_folder: str_cell(measures_rs, row, "DisplayFolder"),
                format_string: str_cell(measures_rs, row, "FormatString"),
                is_hidden: bool_cell(measures_rs, row, "IsHidden"),
                description: str_cell(measures_rs, row, "Description"),
                extras: extras_from_row(measures_rs, row, MEASURE_COLS),
            });
        }
    }

    let relationships = relationships_rs
        .rows
        .iter()
        .map(|row| RawRelationship {
            name: str_cell(relationships_rs, row, "RelationshipName"),
            from_table: str_cell(relationships_rs, row, "FromTable"),
            from_column: str_cell(relationships_rs, row, "FromColumn"),
            to_table: str_cell(relationships_rs, row, "ToTable"),
            to_column: str_cell(relationships_rs, row, "ToColumn"),
            is_active: bool_cell(relationships_rs, row, "IsActive"),
            cross_filtering_behavior: str_cell(relationships_rs, row, "CrossFilteringBehavior"),
            security_filtering_behavior: str_cell(
                relationships_rs,
                row,
                "SecurityFilteringBehavior",
            ),
            extras: extras_from_row(relationships_rs, row, RELATIONSHIP_COLS),
        })
        .collect();

    let mut cultures: Vec<RawCulture> = cultures_rs
        .rows
        .iter()
        .map(|row| RawCulture {
            name: str_cell(cultures_rs, row, "CultureName"),
            translations: Vec::new(),
            extras: extras_from_row(cultures_rs, row, &["CultureName"]),
        })
        .collect();
    for row in &translations_rs.rows {
        let culture_name = str_cell(translations_rs, row, "CultureName");
        if let Some(culture) = cultures.iter_mut().find(|c| c.name == culture_name) {
            culture.translations.push(RawObjectTranslation {
                object_name: str_cell(translations_rs, row, "ObjectName"),
                property: str_cell(translations_rs, row, "Property"),
                value: str_cell(translations_rs, row, "Value"),
            });
        }
    }

    let mut roles: Vec<RawRole> = roles_rs
        .rows
        .iter()
        .map(|row| RawRole {
            name: str_cell(roles_rs, row, "RoleName"),
            table_permissions: Vec::new(),
            extras: extras_from_row(roles_rs, row, &["RoleName"]),
        })
        .collect();
    let mut table_perms: Vec<(String, RawTablePermission)> = table_perms_rs
        .rows
        .iter()
        .map(|row| {
            (
                str_cell(table_perms_rs, row, "RoleName"),
                RawTablePermission {
                    table: str_cell(table_perms_rs, row, "TableName"),
                    filter_expression: opt_str_cell(table_perms_rs, row, "FilterExpression"),
                    column_permissions: Vec::new(),
                },
            )
        })
        .collect();
    for row in &column_perms_rs.rows {
        let role_name = str_cell(column_perms_rs, row, "RoleName");
        let table_name = str_cell(column_perms_rs, row, "TableName");
        if let Some((_, perm)) = table_perms
            .iter_mut()
            .find(|(r, p)| r == &role_name && p.table == table_name)
        {
            perm.column_permissions.push(RawColumnPermission {
                column: str_cell(column_perms_rs, row, "ColumnName"),
                metadata_permission: str_cell(column_perms_rs, row, "MetadataPermission"),
            });
        }
    }
    for (role_name, perm) in table_perms {
        if let Some(role) = roles.iter_mut().find(|r| r.name == role_name) {
            role.table_permissions.push(perm);
        }
    }

    RawModel {
        name: String::new(),
        tables: std::mem::take(&mut tables),
        relationships,
        cultures,
        roles,
    }
}
