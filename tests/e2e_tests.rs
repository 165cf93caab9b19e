//! End-to-end tests against a real tabular server (Analysis Services /
//! Power BI Premium XMLA endpoint reachable over the TDS-style port).
//!
//! These tests connect to a live instance, inspect its model, run DAX/DMV
//! queries and exercise a refresh, rather than scripting a `FakeDriver`.
//!
//! Prerequisites:
//! - A tabular server reachable at the configured endpoint, with a database
//!   matching TABULAR_DATABASE already deployed (at least one table with at
//!   least one partition).
//!
//! Environment variables (with defaults):
//! - TABULAR_SERVER (default: localhost)
//! - TABULAR_DATABASE (default: AdventureWorks)
//! - TABULAR_USER (optional; omit for integrated/trusted auth)
//! - TABULAR_PASSWORD (optional)
//!
//! Run with: cargo test --test e2e_tests -- --ignored

use std::sync::LazyLock;

use tabular_client::{ConnectionString, RefreshOptions, RefreshTarget, Server};

fn load_env() {
    let _ = dotenvy::dotenv();
}

static SERVER_CONFIG: LazyLock<ServerConfig> = LazyLock::new(|| {
    load_env();
    ServerConfig {
        host: std::env::var("TABULAR_SERVER").unwrap_or_else(|_| "localhost".to_string()),
        database: std::env::var("TABULAR_DATABASE").unwrap_or_else(|_| "AdventureWorks".to_string()),
        user: std::env::var("TABULAR_USER").ok(),
        password: std::env::var("TABULAR_PASSWORD").ok(),
    }
});

struct ServerConfig {
    host: String,
    database: String,
    user: Option<String>,
    password: Option<String>,
}

fn connection_string() -> String {
    let cfg = &*SERVER_CONFIG;
    let mut parts = vec![
        format!("Data Source={}", cfg.host),
        format!("Initial Catalog={}", cfg.database),
    ];
    if let Some(user) = &cfg.user {
        parts.push(format!("User ID={user}"));
    }
    if let Some(password) = &cfg.password {
        parts.push(format!("Password={password}"));
    }
    parts.join(";")
}

async fn connect() -> Server {
    let cs = ConnectionString::parse(&connection_string()).expect("valid connection string");
    Server::connect(cs).await.expect("connect to live tabular server")
}

#[tokio::test]
#[ignore]
async fn connects_and_reloads_the_full_model() {
    let server = connect().await;
    assert!(!server.model().tables.is_empty(), "expected at least one table in {}", SERVER_CONFIG.database);
}

#[tokio::test]
#[ignore]
async fn runs_a_dax_query_against_the_live_model() {
    let server = connect().await;
    let table_name = server
        .model()
        .tables
        .iter()
        .next()
        .expect("at least one table")
        .name
        .clone();

    let dax = format!("EVALUATE {{COUNTROWS('{table_name}')}}");
    let outcome = server
        .model()
        .connection()
        .execute(&dax, None)
        .await
        .expect("query should succeed");
    assert!(outcome.as_scalar().is_some());
}

#[tokio::test]
#[ignore]
async fn refreshes_the_first_table_and_reports_its_partitions() {
    let mut server = connect().await;
    let table_name = server
        .model()
        .tables
        .iter()
        .next()
        .expect("at least one table")
        .name
        .clone();

    let report = tabular_client::refresh(
        server.model_mut(),
        RefreshTarget::table(table_name.clone()),
        RefreshOptions {
            default_row_count_check: false,
            ..Default::default()
        },
    )
    .await
    .expect("refresh should succeed");

    assert!(report.iter().all(|p| p.table == table_name));
}

#[tokio::test]
#[ignore]
async fn disconnect_then_reconnect_restores_the_session() {
    let server = connect().await;
    server.disconnect().await.expect("disconnect should succeed");
    assert!(!server.is_connected().await);
    server.reconnect().await.expect("reconnect should succeed");
    assert!(server.is_connected().await);
}
