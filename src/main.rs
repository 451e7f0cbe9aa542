//! Arbor CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Parse, store, and query code ASTs in a graph database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the local database container
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Ingest a code file or snippet into the graph
    Ingest {
        /// Path to the code file
        path: Option<PathBuf>,

        /// Source code string to ingest instead of a file path
        #[arg(long)]
        code: Option<String>,

        /// Language name or alias (e.g. python, js, ts, rust)
        #[arg(long)]
        language: Option<String>,
    },
    /// Query the ingested graph
    Query {
        #[command(subcommand)]
        command: QueryCommands,
    },
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7843")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Pull the database image and start the container
    Start,
    /// Stop and remove the database container
    Stop,
    /// Show the database container state
    Status,
}

#[derive(Subcommand)]
enum QueryCommands {
    /// List ingested files
    Files {
        /// Max rows to return
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// List distinct AST node types
    NodeTypes {
        /// Filter by file path
        #[arg(long)]
        file: Option<String>,

        /// Max rows to return
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Find AST nodes by type
    Nodes {
        /// AST node type to search for
        #[arg(long = "type")]
        node_type: String,

        /// Filter by file path
        #[arg(long)]
        file: Option<String>,

        /// Max rows to return
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// List ordered children of a node
    Children {
        /// Span key of the parent node
        #[arg(long)]
        span_key: String,

        /// Max rows to return
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Run a raw read-only Cypher query
    Cypher {
        /// Query to execute
        query_string: String,

        /// Number of RETURN columns in the query
        #[arg(long, default_value = "1")]
        columns: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("arbor={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Start => commands::db_start(),
            DbCommands::Stop => commands::db_stop(),
            DbCommands::Status => commands::db_status(),
        },
        Commands::Ingest {
            path,
            code,
            language,
        } => commands::ingest(path, code, language).await,
        Commands::Query { command } => match command {
            QueryCommands::Files { limit } => commands::query_files(limit).await,
            QueryCommands::NodeTypes { file, limit } => {
                commands::query_node_types(file, limit).await
            }
            QueryCommands::Nodes {
                node_type,
                file,
                limit,
            } => commands::query_nodes(node_type, file, limit).await,
            QueryCommands::Children { span_key, limit } => {
                commands::query_children(span_key, limit).await
            }
            QueryCommands::Cypher {
                query_string,
                columns,
            } => commands::query_cypher(query_string, columns).await,
        },
        Commands::Serve { port, host } => commands::serve(host, port).await,
        Commands::Version => {
            println!("arbor v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
