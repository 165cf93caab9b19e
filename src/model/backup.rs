//! Experimental `Backup_Table`/`Revert_Table` operations, carried over from
//! `pytabular.py` largely unchanged in intent: clone a table under a
//! `_backup` suffix before a risky edit, then revert to it if the edit goes
//! wrong. Kept separate from `ops` and clearly marked experimental because,
//! unlike the rest of the mutation surface, it has no server-side transaction
//! to anchor it — a partial failure between cloning and committing can leave
//! stray backup tables behind.

use crate::error::{Result, TabularError};

use super::entities::{Relationship, RelationshipEndpoint, Table};
use super::graph::Model;

const BACKUP_SUFFIX: &str = "_backup";

/// Clones `table_name` under a `_backup` suffix, including its relationships'
/// endpoints and any role table/column permissions that reference it, so the
/// backup is queryable on its own. Refuses to overwrite an existing backup.
pub async fn backup_table(model: &mut Model, table_name: &str) -> Result<()> {
    let backup_name = format!("{table_name}{BACKUP_SUFFIX}");
    if model.tables.contains_name(&backup_name) {
        return Err(TabularError::CommitError {
            message: format!("a backup named '{backup_name}' already exists; revert or drop it first"),
        });
    }

    let mut clone = model.find_table(table_name)?.clone();
    clone.name = backup_name.clone();
    for column in clone.columns.iter_mut() {
        column.table_name = backup_name.clone();
    }
    for partition in clone.partitions.iter_mut() {
        partition.table_name = backup_name.clone();
    }
    for measure in clone.measures.iter_mut() {
        measure.table_name = backup_name.clone();
    }

    let relationship_clones: Vec<Relationship> = model
        .relationships
        .iter()
        .filter(|r| r.from.table == table_name || r.to.table == table_name)
        .map(|r| {
            let mut cloned = r.clone();
            cloned.name = format!("{}{BACKUP_SUFFIX}", r.name);
            if cloned.from.table == table_name {
                cloned.from = RelationshipEndpoint {
                    table: backup_name.clone(),
                    column: r.from.column.clone(),
                };
            }
            if cloned.to.table == table_name {
                cloned.to = RelationshipEndpoint {
                    table: backup_name.clone(),
                    column: r.to.column.clone(),
                };
            }
            cloned
        })
        .collect();

    for role in model.roles.iter_mut() {
        let cloned_permissions: Vec<_> = role
            .table_permissions
            .iter()
            .filter(|p| p.table == table_name)
            .map(|p| {
                let mut cloned = p.clone();
                cloned.table = backup_name.clone();
                cloned
            })
            .collect();
        role.table_permissions.extend(cloned_permissions);
    }

    model.tables.push(clone);
    for relationship in relationship_clones {
        model.relationships.push(relationship);
    }

    Ok(())
}

/// Reverts `table_name` to its `_backup` clone: the backup's data replaces the
/// live table's columns/partitions/measures in place, and the backup entry
/// itself is removed. Fails if no backup exists.
pub async fn revert_table(model: &mut Model, table_name: &str) -> Result<()> {
    let backup_name = format!("{table_name}{BACKUP_SUFFIX}");
    let backup = model
        .tables
        .iter()
        .find(|t| t.name == backup_name)
        .cloned()
        .ok_or_else(|| crate::error::not_found("Table", backup_name.clone(), None))?;

    let live = model.find_table_mut(table_name)?;
    live.columns = backup.columns;
    live.partitions = backup.partitions;
    live.measures = backup.measures;
    for column in live.columns.iter_mut() {
        column.table_name = table_name.to_string();
    }
    for partition in live.partitions.iter_mut() {
        partition.table_name = table_name.to_string();
    }
    for measure in live.measures.iter_mut() {
        measure.table_name = table_name.to_string();
    }

    model.tables = model
        .tables
        .iter()
        .filter(|t| t.name != backup_name)
        .cloned()
        .collect();
    model.relationships = model
        .relationships
        .iter()
        .filter(|r| r.from.table != backup_name && r.to.table != backup_name)
        .cloned()
        .collect();

    Ok(())
}
