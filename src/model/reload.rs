//! Converts the driver's `Raw*` metadata mirror types into the typed graph
//! entities `Model::reload` installs. Kept separate from `driver` so the two
//! modules never need to depend on each other's types directly.

use std::sync::Arc;

use crate::connection::Connection;
use crate::driver::{RawCulture, RawDatabaseInfo, RawModel, RawRole, RawTable};
use crate::error::Result;

use super::collection::Collection;
use super::entities::{
    Column, Culture, ObjectTranslation, Partition, PartitionSource, Relationship,
    RelationshipEndpoint, Table,
};
use super::types::{
    ColumnKind, CrossFilteringBehavior, DataType, PartitionMode, PartitionState,
    SecurityFilteringBehavior, SourceType, TranslatedProperty,
};

/// The typed collections `Model::reload` installs in one assignment.
pub(crate) struct ModelSnapshot {
    pub tables: Collection<Table>,
    pub relationships: Collection<Relationship>,
    pub cultures: Collection<Culture>,
    pub roles: Collection<super::entities::Role>,
}

fn convert_table(raw: RawTable) -> Table {
    let mut table = Table::new(raw.name.clone());
    table.is_hidden = raw.is_hidden;
    table.data_category = raw.data_category;
    table.modified_time = raw.modified_time;
    table.extras = raw.extras;

    table.columns = raw
        .columns
        .into_iter()
        .map(|c| Column {
            name: c.name,
            table_name: raw.name.clone(),
            data_type: DataType::parse(&c.data_type),
            kind: ColumnKind::parse(&c.kind),
            is_hidden: c.is_hidden,
            is_key: c.is_key,
            is_nullable: c.is_nullable,
            is_available_in_mdx: c.is_available_in_mdx,
            encoding_hint: c.encoding_hint,
            display_folder: c.display_folder,
            extras: c.extras,
        })
        .collect();

    table.partitions = raw
        .partitions
        .into_iter()
        .map(|p| {
            let source_type = SourceType::parse(&p.source_type);
            let source = match source_type {
                SourceType::Calculated | SourceType::CalculationGroup => {
                    PartitionSource::Calculated(p.source.clone())
                }
                SourceType::Query => PartitionSource::Query(p.source.clone()),
                SourceType::M => PartitionSource::MExpression(p.source.clone()),
            };
            Partition {
                name: p.name,
                table_name: raw.name.clone(),
                mode: PartitionMode::parse(&p.mode),
                state: PartitionState::parse(&p.state),
                source_type,
                source,
                refreshed_time: p.refreshed_time,
                extras: p.extras,
            }
        })
        .collect();

    table.measures = raw
        .measures
        .into_iter()
        .map(|m| super::entities::Measure {
            name: m.name,
            table_name: raw.name.clone(),
            expression: m.expression,
            display_folder: m.display_folder,
            format_string: m.format_string,
            is_hidden: m.is_hidden,
            description: m.description,
            extras: m.extras,
        })
        .collect();

    table
}

fn convert_culture(raw: RawCulture) -> Culture {
    Culture {
        name: raw.name,
        translations: raw
            .translations
            .into_iter()
            .map(|t| ObjectTranslation {
                object_name: t.object_name,
                property: TranslatedProperty::parse(&t.property),
                value: t.value,
            })
            .collect(),
        extras: raw.extras,
    }
}

fn convert_role(raw: RawRole) -> super::entities::Role {
    super::entities::Role {
        name: raw.name,
        table_permissions: raw
            .table_permissions
            .into_iter()
            .map(|p| super::entities::TablePermission {
                table: p.table,
                filter_expression: p.filter_expression,
                column_permissions: p
                    .column_permissions
                    .into_iter()
                    .map(|c| super::entities::ColumnPermission {
                        column: c.column,
                        metadata_permission: c.metadata_permission,
                    })
                    .collect(),
            })
            .collect(),
        extras: raw.extras,
    }
}

fn convert(raw: RawModel) -> ModelSnapshot {
    ModelSnapshot {
        tables: raw.tables.into_iter().map(convert_table).collect(),
        relationships: raw
            .relationships
            .into_iter()
            .map(|r| Relationship {
                name: r.name,
                from: RelationshipEndpoint {
                    table: r.from_table,
                    column: r.from_column,
                },
                to: RelationshipEndpoint {
                    table: r.to_table,
                    column: r.to_column,
                },
                is_active: r.is_active,
                cross_filtering_behavior: CrossFilteringBehavior::parse(
                    &r.cross_filtering_behavior,
                ),
                security_filtering_behavior: SecurityFilteringBehavior::parse(
                    &r.security_filtering_behavior,
                ),
                extras: r.extras,
            })
            .collect(),
        cultures: raw.cultures.into_iter().map(convert_culture).collect(),
        roles: raw.roles.into_iter().map(convert_role).collect(),
    }
}

pub(crate) async fn fetch_model(connection: &Arc<Connection>, _name: &str) -> Result<ModelSnapshot> {
    let raw = connection.fetch_model().await?;
    Ok(convert(raw))
}

pub(crate) async fn fetch_database_info(
    connection: &Arc<Connection>,
    catalog: &str,
) -> Result<RawDatabaseInfo> {
    connection.fetch_database_info(catalog).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{RawColumn, RawMeasure, RawPartition};

    #[test]
    fn converts_a_table_with_nested_children() {
        let raw = RawTable {
            name: "Sales".to_string(),
            columns: vec![RawColumn {
                name: "OrderDate".to_string(),
                data_type: "DateTime".to_string(),
                kind: "Data".to_string(),
                ..Default::default()
            }],
            partitions: vec![RawPartition {
                name: "Sales-2024".to_string(),
                source_type: "M".to_string(),
                source: "let Source = ... in Source".to_string(),
                ..Default::default()
            }],
            measures: vec![RawMeasure {
                name: "Total Sales".to_string(),
                expression: "SUM(Sales[Amount])".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let table = convert_table(raw);
        assert_eq!(table.columns.by_name("OrderDate").unwrap().data_type, DataType::DateTime);
        assert_eq!(table.partitions.by_name("Sales-2024").unwrap().table_name, "Sales");
        assert_eq!(table.measures.by_name("Total Sales").unwrap().table_name, "Sales");
    }
}
