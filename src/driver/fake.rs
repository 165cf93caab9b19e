//! An in-memory `ServerDriver` used by unit and integration tests.
//!
//! Tests script exact-match responses for known statements and install a
//! `RawModel` snapshot directly; anything unscripted surfaces as a `QueryError`,
//! the same way a real server would reject a statement it doesn't understand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, TabularError};

use super::{
    RawChangeSet, RawDatabaseInfo, RawModel, ResultSet, ServerDriver, TraceEventHandler,
    TraceEventSpec, TraceHandle,
};

#[derive(Clone, Default)]
pub struct FakeDriver {
    responses: Arc<Mutex<HashMap<String, ResultSet>>>,
    connected: Arc<AtomicBool>,
    model: Arc<Mutex<RawModel>>,
    database_info: Arc<Mutex<RawDatabaseInfo>>,
    /// Scripted response for the next `save_changes` call.
    next_change_set: Arc<Mutex<Option<RawChangeSet>>>,
    /// When set, the next `save_changes` call fails with this message instead
    /// of applying `next_change_set`, simulating a server-rejected commit.
    fail_next_commit: Arc<Mutex<Option<String>>>,
    traces: Arc<Mutex<Vec<TraceHandle>>>,
    handlers: Arc<Mutex<Vec<(String, TraceEventHandler)>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(true)),
            model: Arc::new(Mutex::new(RawModel::default())),
            database_info: Arc::new(Mutex::new(RawDatabaseInfo::default())),
            next_change_set: Arc::new(Mutex::new(None)),
            fail_next_commit: Arc::new(Mutex::new(None)),
            traces: Arc::new(Mutex::new(Vec::new())),
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(self, statement: impl Into<String>, result: ResultSet) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(statement.into(), result);
        self
    }

    pub fn set_response(&self, statement: impl Into<String>, result: ResultSet) {
        self.responses.lock().unwrap().insert(statement.into(), result);
    }

    pub fn with_model(self, model: RawModel) -> Self {
        *self.model.lock().unwrap() = model;
        self
    }

    pub fn set_model(&self, model: RawModel) {
        *self.model.lock().unwrap() = model;
    }

    pub fn with_database_info(self, info: RawDatabaseInfo) -> Self {
        *self.database_info.lock().unwrap() = info;
        self
    }

    /// Scripts the `RawChangeSet` the next (and only the next) `save_changes`
    /// call will return; subsequent calls return an empty change set.
    pub fn queue_change_set(&self, change_set: RawChangeSet) {
        *self.next_change_set.lock().unwrap() = Some(change_set);
    }

    /// Makes the next `save_changes` call fail with a `CommitError` carrying
    /// `message`, simulating the server rejecting a batch of changes.
    pub fn fail_next_commit(&self, message: impl Into<String>) {
        *self.fail_next_commit.lock().unwrap() = Some(message.into());
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Test-only hook: synchronously invokes every handler subscribed to
    /// `trace_name`, simulating the server pushing an event from its own
    /// callback thread.
    pub fn fire_event(&self, trace_name: &str, event: super::RawTraceEvent) {
        let handlers = self.handlers.lock().unwrap();
        for (name, handler) in handlers.iter() {
            if name == trace_name {
                handler(event.clone());
            }
        }
    }

    pub fn active_trace_names(&self) -> Vec<String> {
        self.traces.lock().unwrap().iter().map(|t| t.name.clone()).collect()
    }
}

#[async_trait]
impl ServerDriver for FakeDriver {
    async fn execute(&self, statement: &str) -> Result<ResultSet> {
        self.responses
            .lock()
            .unwrap()
            .get(statement)
            .cloned()
            .ok_or_else(|| TabularError::QueryError {
                statement: statement.to_string(),
                message: "no scripted response for this statement".to_string(),
            })
    }

    async fn open_as(&self, _effective_user: &str) -> Result<Box<dyn ServerDriver>> {
        Ok(Box::new(self.clone()))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_model(&self) -> Result<RawModel> {
        Ok(self.model.lock().unwrap().clone())
    }

    async fn fetch_database_info(&self, _catalog: &str) -> Result<RawDatabaseInfo> {
        Ok(*self.database_info.lock().unwrap())
    }

    async fn save_changes(&self, _ops: &[super::PendingOp]) -> Result<RawChangeSet> {
        if let Some(message) = self.fail_next_commit.lock().unwrap().take() {
            return Err(TabularError::CommitError { message });
        }
        Ok(self.next_change_set.lock().unwrap().take().unwrap_or_default())
    }

    async fn create_trace(&self, name: &str, _events: &[TraceEventSpec]) -> Result<TraceHandle> {
        let handle = TraceHandle {
            name: name.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
        };
        self.traces.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    async fn start_trace(&self, _trace: &TraceHandle) -> Result<()> {
        Ok(())
    }

    async fn stop_trace(&self, _trace: &TraceHandle) -> Result<()> {
        Ok(())
    }

    async fn drop_trace(&self, trace: &TraceHandle) -> Result<()> {
        self.traces.lock().unwrap().retain(|t| t.id != trace.id);
        self.handlers.lock().unwrap().retain(|(name, _)| name != &trace.name);
        Ok(())
    }

    async fn subscribe(&self, trace: &TraceHandle, handler: TraceEventHandler) -> Result<()> {
        self.handlers.lock().unwrap().push((trace.name.clone(), handler));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unscripted_statement_is_a_query_error() {
        let driver = FakeDriver::new();
        let err = driver.execute("EVALUATE {1}").await.unwrap_err();
        assert!(matches!(err, TabularError::QueryError { .. }));
    }

    #[tokio::test]
    async fn scripted_statement_round_trips() {
        let driver = FakeDriver::new().with_response(
            "EVALUATE {1}",
            ResultSet {
                columns: vec!["Value".into()],
                rows: vec![vec![super::super::CellValue::Int(1)]],
            },
        );
        let result = driver.execute("EVALUATE {1}").await.unwrap();
        assert_eq!(result.rows[0][0], super::super::CellValue::Int(1));
    }

    #[tokio::test]
    async fn fired_events_reach_subscribed_handlers() {
        let driver = FakeDriver::new();
        let trace = driver.create_trace("t", &[]).await.unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        driver
            .subscribe(
                &trace,
                Arc::new(move |event| received_clone.lock().unwrap().push(event.event_name)),
            )
            .await
            .unwrap();
        driver.fire_event(
            "t",
            super::super::RawTraceEvent {
                event_name: "ProgressReportEnd".to_string(),
                columns: HashMap::new(),
            },
        );
        assert_eq!(received.lock().unwrap().as_slice(), ["ProgressReportEnd"]);
    }
}
