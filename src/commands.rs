//! CLI command implementations

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};

use arbor_core::{Config, GitCli, GraphStore, IngestEngine, IngestRequest, MemoryBackend, query};
use arbor_parsers::SyntaxParser;
use arbor_server::{ArborServer, ServerConfig};

const CONTAINER_NAME: &str = "arbor-db";
const IMAGE: &str = "apache/age:latest";

/// Wire the engine to the in-process reference backend. Any [`GraphStore`]
/// implementation plugs in here; the relational backend lives outside this
/// workspace.
fn build_engine() -> Arc<IngestEngine> {
    let store: Arc<dyn GraphStore> = Arc::new(MemoryBackend::new());
    let parser = Arc::new(SyntaxParser::default());
    let vcs = Arc::new(GitCli);
    Arc::new(IngestEngine::new(store, parser, vcs))
}

pub async fn ingest(
    path: Option<PathBuf>,
    code: Option<String>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let engine = build_engine();
    let outcome = engine
        .ingest(IngestRequest {
            path,
            code,
            language,
        })
        .await?;
    println!(
        "Ingested file {} (language: {})",
        outcome.file_uuid, outcome.language
    );
    Ok(())
}

pub async fn serve(host: String, port: u16) -> anyhow::Result<()> {
    let config = Config::from_env();
    tracing::info!("Backend DSN: {}", config.database_url);

    let engine = build_engine();
    let server = ArborServer::new(engine, ServerConfig { host, port });
    server.start().await
}

// ── Query commands ──────────────────────────────────────────────────────────

pub async fn query_files(limit: usize) -> anyhow::Result<()> {
    let engine = build_engine();
    let page = query::list_files(engine.store().as_ref(), limit, None, None).await?;
    let rows: Vec<Vec<String>> = page
        .items
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.full_path.clone(),
                r.suffix.clone(),
                r.content_hash.clone(),
            ]
        })
        .collect();
    print_table(&["id", "full_path", "suffix", "content_hash"], &rows);
    Ok(())
}

pub async fn query_node_types(file: Option<String>, limit: usize) -> anyhow::Result<()> {
    let engine = build_engine();
    let types = query::node_types(engine.store().as_ref(), file.as_deref(), limit).await?;
    let rows: Vec<Vec<String>> = types.into_iter().map(|t| vec![t]).collect();
    print_table(&["type"], &rows);
    Ok(())
}

pub async fn query_nodes(
    node_type: String,
    file: Option<String>,
    limit: usize,
) -> anyhow::Result<()> {
    let engine = build_engine();
    let page = query::nodes_by_type(
        engine.store().as_ref(),
        &node_type,
        file.as_deref(),
        limit,
        None,
        None,
    )
    .await?;
    let rows: Vec<Vec<String>> = page
        .items
        .iter()
        .map(|r| {
            vec![
                r.span_key.clone(),
                r.kind.clone(),
                r.start_byte.to_string(),
                r.end_byte.to_string(),
            ]
        })
        .collect();
    print_table(&["span_key", "type", "start_byte", "end_byte"], &rows);
    Ok(())
}

pub async fn query_children(span_key: String, limit: usize) -> anyhow::Result<()> {
    let engine = build_engine();
    let children = query::children(engine.store().as_ref(), &span_key, limit).await?;
    let rows: Vec<Vec<String>> = children
        .iter()
        .map(|r| {
            vec![
                r.span_key.clone(),
                r.kind.clone(),
                r.child_index.to_string(),
            ]
        })
        .collect();
    print_table(&["span_key", "type", "child_index"], &rows);
    Ok(())
}

pub async fn query_cypher(query_string: String, columns: usize) -> anyhow::Result<()> {
    let engine = build_engine();
    let rows = query::run_query_readonly(engine.store().as_ref(), &query_string, columns).await?;
    if rows.is_empty() {
        println!("(0 rows)");
        return Ok(());
    }
    let headers: Vec<String> = (0..rows[0].len()).map(|i| format!("col{}", i)).collect();
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    print_table(&header_refs, &rows);
    Ok(())
}

const MAX_COL_WIDTH: usize = 80;

fn truncate(value: &str) -> String {
    if value.len() > MAX_COL_WIDTH {
        format!("{}...", &value[..MAX_COL_WIDTH - 3])
    } else {
        value.to_string()
    }
}

/// Print a column-aligned text table with a row-count footer.
fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| truncate(v)).collect())
        .collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, val) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(val.len());
            }
        }
    }

    let fmt_row = |values: &[String]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:<width$}", v, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header_row: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    println!("{}", fmt_row(&header_row));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in &rows {
        println!("{}", fmt_row(row));
    }
    println!("({} rows)", rows.len());
}

// ── Database container lifecycle ────────────────────────────────────────────

fn docker_available() -> bool {
    Command::new("docker")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Container state (`running`, `exited`, ...) or None when absent.
fn container_state() -> Option<String> {
    let output = Command::new("docker")
        .args(["inspect", "-f", "{{.State.Status}}", CONTAINER_NAME])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn wait_for_ready(port: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let ready = Command::new("docker")
            .args([
                "exec",
                CONTAINER_NAME,
                "pg_isready",
                "-U",
                "postgres",
                "-p",
                &port.to_string(),
            ])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if ready {
            return true;
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    false
}

fn run_docker(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("docker")
        .args(args)
        .status()
        .context("failed to run docker")?;
    if !status.success() {
        bail!("docker {} failed", args.join(" "));
    }
    Ok(())
}

pub fn db_start() -> anyhow::Result<()> {
    if !docker_available() {
        bail!("Docker is not installed or not in PATH");
    }
    let port = Config::from_env().database_port();

    match container_state().as_deref() {
        Some("running") => {
            println!("Container {} is already running.", CONTAINER_NAME);
            return Ok(());
        }
        Some("exited") => {
            println!("Restarting stopped container {}...", CONTAINER_NAME);
            run_docker(&["start", CONTAINER_NAME])?;
        }
        _ => {
            println!("Pulling {}...", IMAGE);
            run_docker(&["pull", IMAGE])?;
            println!("Starting container...");
            run_docker(&[
                "run",
                "-d",
                "--name",
                CONTAINER_NAME,
                "-p",
                &format!("{}:5432", port),
                "-e",
                "POSTGRES_PASSWORD=postgres",
                IMAGE,
            ])?;
        }
    }

    println!("Waiting for database to be ready...");
    if wait_for_ready(5432, Duration::from_secs(30)) {
        println!("Database ready on localhost:{}", port);
        Ok(())
    } else {
        bail!("database did not become ready in time")
    }
}

pub fn db_stop() -> anyhow::Result<()> {
    if !docker_available() {
        bail!("Docker is not installed or not in PATH");
    }
    if container_state().is_none() {
        println!("Container {} not found.", CONTAINER_NAME);
        return Ok(());
    }
    println!("Stopping {}...", CONTAINER_NAME);
    run_docker(&["stop", CONTAINER_NAME])?;
    run_docker(&["rm", CONTAINER_NAME])?;
    println!("Container stopped and removed.");
    Ok(())
}

pub fn db_status() -> anyhow::Result<()> {
    if !docker_available() {
        bail!("Docker is not installed or not in PATH");
    }
    match container_state() {
        None => println!("Container {}: not found", CONTAINER_NAME),
        Some(state) => println!("Container {}: {}", CONTAINER_NAME, state),
    }
    Ok(())
}
