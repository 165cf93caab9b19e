//! tabular-cli: a thin smoke-test consumer of `tabular-client`.
//!
//! Contains no logic of its own beyond argument parsing and print
//! formatting; every subcommand is a handful of calls into the library.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tabular_client::driver::{CellValue, QueryOutcome};
use tabular_client::model::RefreshType;
use tabular_client::refresh::RefreshOptions;
use tabular_client::{ConnectionString, RefreshTarget, Server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabular-cli")]
#[command(author, version, about = "Programmatic client for tabular OLAP models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a server/database and report basic info
    Connect {
        /// Full Analysis-Services-style connection string
        #[arg(short, long)]
        connection_string: String,
    },
    /// Run a DAX/MDX/DMV statement (or a path to a file containing one)
    Query {
        #[arg(short, long)]
        connection_string: String,

        /// The statement itself, or a path to a file containing it
        statement: String,

        /// Run the query impersonating this effective user
        #[arg(short, long)]
        effective_user: Option<String>,
    },
    /// Refresh a table (or one partition of it) and print the report
    Refresh {
        #[arg(short, long)]
        connection_string: String,

        /// Name of the table to refresh
        table: String,

        /// Refresh only this partition, instead of the whole table
        #[arg(short, long)]
        partition: Option<String>,
    },
    /// List tables, or the columns/partitions/measures of one table
    Inspect {
        #[arg(short, long)]
        connection_string: String,

        /// Name of a specific table to inspect
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Connect { connection_string } => {
            let conn_string = ConnectionString::parse(&connection_string)?;
            let server = Server::connect(conn_string).await?;
            println!(
                "connected to '{}' (database '{}', {} tables, compatibility level {})",
                server.name,
                server.database.name,
                server.model().tables.len(),
                server.database.compatibility_level
            );
        }
        Commands::Query {
            connection_string,
            statement,
            effective_user,
        } => {
            let conn_string = ConnectionString::parse(&connection_string)?;
            let server = Server::connect(conn_string).await?;
            let outcome = server
                .model()
                .connection()
                .execute(&statement, effective_user.as_deref())
                .await?;
            print_outcome(&outcome);
        }
        Commands::Refresh {
            connection_string,
            table,
            partition,
        } => {
            let conn_string = ConnectionString::parse(&connection_string)?;
            let mut server = Server::connect(conn_string).await?;
            let target = match partition {
                Some(p) => RefreshTarget::partition(table, p),
                None => RefreshTarget::table(table),
            };
            let report = tabular_client::refresh(
                server.model_mut(),
                target,
                RefreshOptions {
                    kind: RefreshType::Full,
                    ..Default::default()
                },
            )
            .await
            .context("refresh failed")?;

            for partition in report {
                println!(
                    "{}.{} refreshed at {}",
                    partition.table, partition.partition, partition.refreshed_time
                );
            }
        }
        Commands::Inspect {
            connection_string,
            table,
        } => {
            let conn_string = ConnectionString::parse(&connection_string)?;
            let server = Server::connect(conn_string).await?;
            match table {
                None => {
                    for table in server.model().tables.iter() {
                        println!(
                            "{} ({} columns, {} partitions, {} measures)",
                            table.name,
                            table.columns.len(),
                            table.partitions.len(),
                            table.measures.len()
                        );
                    }
                }
                Some(name) => {
                    let table = server.model().find_table(&name)?;
                    println!("columns:");
                    for column in table.columns.iter() {
                        println!("  {} ({:?})", column.name, column.data_type);
                    }
                    println!("partitions:");
                    for partition in table.partitions.iter() {
                        println!("  {} (refreshed {})", partition.name, partition.refreshed_time);
                    }
                    println!("measures:");
                    for measure in table.measures.iter() {
                        println!("  {} = {}", measure.name, measure.expression);
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::Scalar(value) => println!("{}", display_cell(value)),
        QueryOutcome::Table(table) => {
            println!("{}", table.columns.join("\t"));
            for row in &table.rows {
                let rendered: Vec<String> = row.iter().map(display_cell).collect();
                println!("{}", rendered.join("\t"));
            }
        }
    }
}

fn display_cell(value: &CellValue) -> String {
    value.to_display_string()
}
