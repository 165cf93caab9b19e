//! `Connection`: the lazily-opened handle to a single tabular server/database.
//!
//! Mirrors the original's `Tabular_Connection`/`Tabular` split: a connection owns the
//! driver and a per-effective-user pool of impersonated sub-drivers, and exposes a
//! single `execute` that accepts either a DAX/MDX/DMV literal or a path to a file
//! containing one.

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::conn_string::ConnectionString;
use crate::driver::tiberius_driver::TiberiusDriver;
use crate::driver::{
    PendingOp, QueryOutcome, RawChangeSet, RawDatabaseInfo, RawModel, ServerDriver, TraceEventHandler,
    TraceEventSpec, TraceHandle,
};
use crate::error::Result;

/// Opts a caller out of `execute`'s file-path sniffing. `Literal` always runs
/// `statement_or_path` as-is even if it happens to name a file on disk;
/// `Path` always reads it as a file and fails if it doesn't exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource {
    Literal,
    Path,
}

pub struct Connection {
    conn_string: ConnectionString,
    driver: Box<dyn ServerDriver>,
    effective_user_drivers: Mutex<HashMap<String, Box<dyn ServerDriver>>>,
}

impl Connection {
    /// Opens a connection immediately using the real TDS driver.
    #[instrument(skip_all, fields(data_source = %conn_string.data_source))]
    pub async fn open(conn_string: ConnectionString) -> Result<Self> {
        let driver = TiberiusDriver::connect(conn_string.clone()).await?;
        Ok(Self::with_driver(conn_string, Box::new(driver)))
    }

    /// Constructs a connection over an already-open driver, used by tests to inject
    /// `FakeDriver` and by any future driver that isn't `tiberius`-backed.
    pub fn with_driver(conn_string: ConnectionString, driver: Box<dyn ServerDriver>) -> Self {
        Self {
            conn_string,
            driver,
            effective_user_drivers: Mutex::new(HashMap::new()),
        }
    }

    pub fn connection_string(&self) -> &ConnectionString {
        &self.conn_string
    }

    /// Executes `statement_or_path` against the server.
    ///
    /// If it names a file that exists on disk, its contents are read and executed
    /// instead of treating the path itself as a statement. When `effective_user` is
    /// set, the statement runs through a cached impersonated driver for that user.
    #[instrument(skip(self, statement_or_path))]
    pub async fn execute(
        &self,
        statement_or_path: &str,
        effective_user: Option<&str>,
    ) -> Result<QueryOutcome> {
        let statement = self.resolve_statement(statement_or_path).await?;

        let result = match effective_user {
            None => self.driver.execute(&statement).await?,
            Some(user) => {
                let mut pool = self.effective_user_drivers.lock().await;
                if !pool.contains_key(user) {
                    let scoped = self.driver.open_as(user).await?;
                    pool.insert(user.to_string(), scoped);
                }
                pool.get(user).unwrap().execute(&statement).await?
            }
        };

        Ok(result.into_scalar_or_table())
    }

    /// Like [`Connection::execute`], but `source` opts out of the default
    /// path-sniffing behavior: `Literal` never stats the filesystem, `Path`
    /// always does and fails if the file is missing.
    #[instrument(skip(self, statement_or_path))]
    pub async fn execute_with_source(
        &self,
        statement_or_path: &str,
        source: QuerySource,
        effective_user: Option<&str>,
    ) -> Result<QueryOutcome> {
        let statement = match source {
            QuerySource::Literal => statement_or_path.to_string(),
            QuerySource::Path => tokio::fs::read_to_string(statement_or_path).await.map_err(|e| {
                crate::driver::connect_error(format!(
                    "failed to read statement file '{statement_or_path}': {e}"
                ))
            })?,
        };

        let result = match effective_user {
            None => self.driver.execute(&statement).await?,
            Some(user) => {
                let mut pool = self.effective_user_drivers.lock().await;
                if !pool.contains_key(user) {
                    let scoped = self.driver.open_as(user).await?;
                    pool.insert(user.to_string(), scoped);
                }
                pool.get(user).unwrap().execute(&statement).await?
            }
        };

        Ok(result.into_scalar_or_table())
    }

    async fn resolve_statement(&self, statement_or_path: &str) -> Result<String> {
        let path = Path::new(statement_or_path);
        match tokio::fs::try_exists(path).await {
            Ok(true) => {
                debug!(path = %path.display(), "reading statement from file");
                let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
                    crate::driver::connect_error(format!(
                        "failed to read statement file '{}': {e}",
                        path.display()
                    ))
                })?;
                Ok(contents)
            }
            _ => Ok(statement_or_path.to_string()),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.driver.is_connected().await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.driver.reconnect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.driver.disconnect().await
    }

    pub async fn fetch_model(&self) -> Result<RawModel> {
        self.driver.fetch_model().await
    }

    pub async fn fetch_database_info(&self, catalog: &str) -> Result<RawDatabaseInfo> {
        self.driver.fetch_database_info(catalog).await
    }

    pub async fn save_changes(&self, ops: &[PendingOp]) -> Result<RawChangeSet> {
        self.driver.save_changes(ops).await
    }

    pub async fn create_trace(&self, name: &str, events: &[TraceEventSpec]) -> Result<TraceHandle> {
        self.driver.create_trace(name, events).await
    }

    pub async fn start_trace(&self, trace: &TraceHandle) -> Result<()> {
        self.driver.start_trace(trace).await
    }

    pub async fn stop_trace(&self, trace: &TraceHandle) -> Result<()> {
        self.driver.stop_trace(trace).await
    }

    pub async fn drop_trace(&self, trace: &TraceHandle) -> Result<()> {
        self.driver.drop_trace(trace).await
    }

    pub async fn subscribe(&self, trace: &TraceHandle, handler: TraceEventHandler) -> Result<()> {
        self.driver.subscribe(trace, handler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::fake::FakeDriver;
    use crate::driver::{CellValue, ResultSet};
    use crate::error::TabularError;

    fn cs() -> ConnectionString {
        ConnectionString::parse("Data Source=localhost;Initial Catalog=Model").unwrap()
    }

    #[tokio::test]
    async fn single_cell_result_coerces_to_scalar() {
        let fake = FakeDriver::new().with_response(
            "EVALUATE {1}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(1)]],
            },
        );
        let conn = Connection::with_driver(cs(), Box::new(fake));
        let outcome = conn.execute("EVALUATE {1}", None).await.unwrap();
        assert_eq!(outcome.as_scalar(), Some(&CellValue::Int(1)));
    }

    #[tokio::test]
    async fn multi_row_result_stays_a_table() {
        let fake = FakeDriver::new().with_response(
            "EVALUATE t",
            ResultSet {
                columns: vec!["A".into(), "B".into()],
                rows: vec![
                    vec![CellValue::Int(1), CellValue::Int(2)],
                    vec![CellValue::Int(3), CellValue::Int(4)],
                ],
            },
        );
        let conn = Connection::with_driver(cs(), Box::new(fake));
        let outcome = conn.execute("EVALUATE t", None).await.unwrap();
        assert!(outcome.as_scalar().is_none());
        assert_eq!(outcome.into_table().rows.len(), 2);
    }

    #[tokio::test]
    async fn effective_user_requests_are_cached_per_user() {
        let fake = FakeDriver::new().with_response(
            "EVALUATE {1}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(1)]],
            },
        );
        let conn = Connection::with_driver(cs(), Box::new(fake));
        conn.execute("EVALUATE {1}", Some("alice@example.com"))
            .await
            .unwrap();
        conn.execute("EVALUATE {1}", Some("alice@example.com"))
            .await
            .unwrap();
        assert_eq!(conn.effective_user_drivers.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn nonexistent_path_is_treated_as_a_literal_statement() {
        let fake = FakeDriver::new().with_response(
            "/no/such/file.dax",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(7)]],
            },
        );
        let conn = Connection::with_driver(cs(), Box::new(fake));
        let outcome = conn.execute("/no/such/file.dax", None).await.unwrap();
        assert_eq!(outcome.as_scalar(), Some(&CellValue::Int(7)));
    }

    #[tokio::test]
    async fn explicit_literal_source_skips_path_sniffing_even_for_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EVALUATE {1}");
        std::fs::write(&path, "not a dax statement").unwrap();
        let path_str = path.to_str().unwrap();

        let fake = FakeDriver::new().with_response(
            path_str,
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![CellValue::Int(9)]],
            },
        );
        let conn = Connection::with_driver(cs(), Box::new(fake));
        let outcome = conn
            .execute_with_source(path_str, QuerySource::Literal, None)
            .await
            .unwrap();
        assert_eq!(outcome.as_scalar(), Some(&CellValue::Int(9)));
    }

    #[tokio::test]
    async fn explicit_path_source_fails_on_a_missing_file() {
        let fake = FakeDriver::new();
        let conn = Connection::with_driver(cs(), Box::new(fake));
        let err = conn
            .execute_with_source("/no/such/file.dax", QuerySource::Path, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TabularError::ConnectError { .. }));
    }
}
