//! `Model`, `Database` and `Server`: the root of the mutable metadata graph.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::conn_string::ConnectionString;
use crate::error::{Result, TabularError};

use super::collection::Collection;
use super::committer::{ChangeSet, PendingChanges};
use super::entities::{Culture, Relationship, Role, Table};
use super::reload;

/// The root of the mutable metadata graph: owns Tables, Relationships, Cultures
/// and Roles. Rebuilt wholesale by [`Model::reload`].
pub struct Model {
    pub name: String,
    pub tables: Collection<Table>,
    pub relationships: Collection<Relationship>,
    pub cultures: Collection<Culture>,
    pub roles: Collection<Role>,
    pub(crate) connection: Arc<Connection>,
    pending: PendingChanges,
}

impl Model {
    /// Constructs an empty graph over an already-open connection. Public so
    /// callers can stand up a `Model`/`Server` over a custom [`ServerDriver`]
    /// (e.g. `FakeDriver` in tests) without a real server round-trip; the
    /// usual path to a populated graph is still [`Server::connect`].
    ///
    /// [`ServerDriver`]: crate::driver::ServerDriver
    pub fn new(name: impl Into<String>, connection: Arc<Connection>) -> Self {
        Self {
            name: name.into(),
            tables: Collection::new(),
            relationships: Collection::new(),
            cultures: Collection::new(),
            roles: Collection::new(),
            connection,
            pending: PendingChanges::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// A cloned handle to the same connection, for collaborators (the refresh
    /// orchestrator's trace reactor) that need to outlive a `&Model` borrow.
    pub fn connection_arc(&self) -> Arc<Connection> {
        self.connection.clone()
    }

    /// Queues a property change, object addition or removal to be applied on the
    /// next [`Model::commit`]. Internal API used by the mutation surface
    /// (measure upsert, table creation, backup/revert, role editing, ...).
    pub(crate) fn pending_mut(&mut self) -> &mut PendingChanges {
        &mut self.pending
    }

    /// Replaces every collection in a single assignment so a partial graph is
    /// never observable to a concurrent reader holding a `&Model`.
    #[instrument(skip_all, fields(model = %self.name))]
    pub async fn reload(&mut self) -> Result<()> {
        debug!("reloading metadata graph from server");
        let snapshot = reload::fetch_model(&self.connection, &self.name).await?;
        self.tables = snapshot.tables;
        self.relationships = snapshot.relationships;
        self.cultures = snapshot.cultures;
        self.roles = snapshot.roles;
        Ok(())
    }

    /// Applies queued mutations on the server and reloads the graph on success.
    ///
    /// If no changes are pending, returns an empty [`ChangeSet`] and logs a
    /// warning rather than round-tripping to the server for nothing.
    #[instrument(skip_all, fields(model = %self.name))]
    pub async fn commit(&mut self) -> Result<ChangeSet> {
        if self.pending.is_empty() {
            tracing::warn!("commit() called with no pending changes");
            return Ok(ChangeSet::empty());
        }
        let ops = self.pending.take();
        let raw = match self.connection.save_changes(&ops).await {
            Ok(cs) => cs,
            Err(e) => {
                // No reload on failure: the in-memory graph must keep reflecting
                // the last known-good server state.
                return Err(e);
            }
        };
        self.reload().await?;
        Ok(ChangeSet::from_raw(raw))
    }

    pub fn find_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .by_name(name)
            .ok_or_else(|| crate::error::not_found("Table", name, None))
    }

    pub fn find_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .by_name_mut(name)
            .ok_or_else(|| crate::error::not_found("Table", name, None))
    }
}

/// A chosen catalog on a `Server`, owning exactly one `Model`.
pub struct Database {
    pub name: String,
    pub estimated_size: u64,
    pub compatibility_level: u32,
    pub model: Model,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        self.model.connection()
    }
}

/// A connected endpoint identified by a connection string.
///
/// Lifecycle: created on `connect`, disposed on `disconnect`; reconnect allowed.
/// Per §3, a Server may hold zero or more Databases, but every real driver
/// round-trip in this crate scopes to the single catalog named in the
/// connection string, mirroring the original `Tabular` class which resolves
/// exactly one `Database`/`Model` pair per connect.
pub struct Server {
    pub name: String,
    connection: Arc<Connection>,
    pub database: Database,
}

impl Server {
    #[instrument(skip_all, fields(data_source = %conn_string.data_source))]
    pub async fn connect(conn_string: ConnectionString) -> Result<Self> {
        let catalog = conn_string.initial_catalog.clone().ok_or_else(|| {
            TabularError::ConnectError {
                message: "connection string is missing an Initial Catalog".to_string(),
            }
        })?;
        let connection = Arc::new(Connection::open(conn_string.clone()).await?);
        Self::from_connection(conn_string.data_source, catalog, connection).await
    }

    /// Builds a `Server`/`Database`/`Model` triple over an already-open
    /// connection, populating the graph with one `reload()`. Public for the
    /// same reason as [`Model::new`]: it lets callers stand up a fully
    /// populated graph over a `FakeDriver` in tests.
    pub async fn from_connection(
        server_name: String,
        catalog: String,
        connection: Arc<Connection>,
    ) -> Result<Self> {
        let info = reload::fetch_database_info(&connection, &catalog).await?;
        let mut model = Model::new(catalog.clone(), connection.clone());
        model.reload().await?;
        Ok(Self {
            name: server_name,
            connection,
            database: Database {
                name: catalog,
                estimated_size: info.estimated_size,
                compatibility_level: info.compatibility_level,
                model,
            },
        })
    }

    pub fn model(&self) -> &Model {
        &self.database.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.database.model
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.connection.reconnect().await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }
}
