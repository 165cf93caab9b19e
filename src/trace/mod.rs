//! The server trace reactor: creates/starts/stops/drops a server trace,
//! discovers which (event, column) pairs the server allows, and fans
//! dispatched events out to a single caller-supplied handler.

pub mod event_categories;
pub mod presets;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::connection::Connection;
use crate::driver::{TraceEventHandler, TraceEventSpec, TraceHandle};
use crate::error::Result;

/// Owns the trace lifecycle. `update()` must run before `start()` so that
/// event/column combinations the server rejects are dropped up front instead
/// of failing the whole installation.
pub struct TraceReactor {
    connection: Arc<Connection>,
    name: String,
    events: Vec<TraceEventSpec>,
    handle: Option<TraceHandle>,
}

impl TraceReactor {
    pub fn new(connection: Arc<Connection>, name: impl Into<String>, events: Vec<TraceEventSpec>) -> Self {
        Self {
            connection,
            name: name.into(),
            events,
            handle: None,
        }
    }

    /// Reconnects the underlying session if found disconnected, then narrows
    /// each event's requested columns to the set the server actually allows.
    #[instrument(skip_all, fields(trace = %self.name))]
    pub async fn update(&mut self) -> Result<()> {
        if !self.connection.is_connected().await {
            warn!("session disconnected before trace update; reconnecting");
            self.connection.reconnect().await?;
        }

        let discovery = self
            .connection
            .execute("SELECT * FROM $SYSTEM.DISCOVER_TRACE_EVENT_CATEGORIES", None)
            .await?
            .into_table();
        let allowed = event_categories::parse_event_categories(&discovery);

        for spec in &mut self.events {
            let Some(allowed_columns) = allowed.get(&spec.event_name) else {
                continue;
            };
            let (kept, dropped): (Vec<_>, Vec<_>) = spec
                .columns
                .drain(..)
                .partition(|c| allowed_columns.contains(c));
            if !dropped.is_empty() {
                warn!(event = %spec.event_name, columns = ?dropped, "server does not permit these columns for this event; skipping");
            }
            spec.columns = kept;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(trace = %self.name))]
    pub async fn create(&mut self) -> Result<()> {
        let handle = self.connection.create_trace(&self.name, &self.events).await?;
        self.handle = Some(handle);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        let handle = self.handle.as_ref().expect("create() must run before start()");
        self.connection.start_trace(handle).await
    }

    pub async fn stop(&self) -> Result<()> {
        let handle = self.handle.as_ref().expect("create() must run before stop()");
        self.connection.stop_trace(handle).await
    }

    /// Registers `handler` to run for every event the server emits on this
    /// trace. Per the driver contract, the handler may be invoked on any
    /// internal thread/task, concurrently with the caller.
    pub async fn subscribe(&self, handler: TraceEventHandler) -> Result<()> {
        let handle = self.handle.as_ref().expect("create() must run before subscribe()");
        self.connection.subscribe(handle, handler).await
    }

    /// Drops the trace and wraps the remaining (connection, handle) pair in a
    /// [`TraceGuard`] so a forgotten explicit `drop()` still tears the trace
    /// down when the guard itself is dropped.
    pub fn into_guard(mut self) -> Option<TraceGuard> {
        self.handle.take().map(|handle| TraceGuard {
            connection: self.connection.clone(),
            handle: Some(handle),
        })
    }

    #[instrument(skip_all, fields(trace = %self.name))]
    pub async fn drop_trace(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            debug!("dropping trace");
            self.connection.drop_trace(&handle).await?;
        }
        Ok(())
    }
}

/// RAII guard standing in for the original's `atexit`-registered cleanup
/// hook: owns a live trace handle and drops it exactly once, either via the
/// explicit async [`TraceGuard::drop_now`] or, if the guard itself is simply
/// dropped, from a best-effort detached task spawned in `Drop`.
pub struct TraceGuard {
    connection: Arc<Connection>,
    handle: Option<TraceHandle>,
}

impl TraceGuard {
    pub async fn drop_now(mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            self.connection.drop_trace(&handle).await?;
        }
        Ok(())
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let connection = self.connection.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.drop_trace(&handle).await {
                    warn!(error = %e, "failed to drop trace during guard cleanup");
                }
            });
        }
    }
}
