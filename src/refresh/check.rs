//! Refresh checks: a paired pre/post probe with an assertion over the two
//! results, run around a refresh commit.

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::Result;
use crate::model::Model;

/// A single named pre/post assertion. Probes return a display string so a
/// failure can carry both values without the orchestrator needing to know
/// their concrete type.
#[async_trait]
pub trait RefreshCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn probe(&self, model: &Model, connection: &Connection) -> Result<String>;
    fn assert(&self, pre: &str, post: &str) -> bool;
}

/// The default-row-count check the orchestrator installs per target table
/// unless disabled: probe is `row_count()`, assertion is `post > 0`.
pub struct RowCountCheck {
    name: String,
    table: String,
}

impl RowCountCheck {
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            name: format!("{table} Row Count"),
            table,
        }
    }
}

#[async_trait]
impl RefreshCheck for RowCountCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self, model: &Model, connection: &Connection) -> Result<String> {
        let count = model.find_table(&self.table)?.row_count(connection).await?;
        Ok(count.to_string())
    }

    fn assert(&self, _pre: &str, post: &str) -> bool {
        post.parse::<i64>().map(|n| n > 0).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn_string::ConnectionString;
    use crate::driver::fake::FakeDriver;
    use crate::driver::{CellValue, ResultSet};
    use crate::model::Table;
    use std::sync::Arc;

    #[tokio::test]
    async fn row_count_check_passes_when_post_is_nonzero() {
        let cs = ConnectionString::parse("Data Source=localhost;Initial Catalog=Model").unwrap();
        let fake = FakeDriver::new().with_response(
            "EVALUATE {COUNTROWS('Sales')}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(10)]],
            },
        );
        let connection = Arc::new(Connection::with_driver(cs, Box::new(fake)));
        let mut model = Model::new("Model", connection.clone());
        model.tables.push(Table::new("Sales"));

        let check = RowCountCheck::new("Sales");
        let post = check.probe(&model, &connection).await.unwrap();
        assert!(check.assert("0", &post));
    }
}
