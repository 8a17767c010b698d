// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Editbridge CLI entrypoint.
//!
//! `editbridge serve` runs the page-edit HTTP endpoints over a pages directory.
//! `editbridge edit <page>` injects the editor into a page and speaks JSON lines: host events on
//! stdin, outbound bridge messages on stdout. Edits persist to a pages directory, or through a
//! running server with `--server`. Logs go to stderr.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use editbridge::backend::{FolderBackend, HttpBackend, PageEditBackend};
use editbridge::config::{Config, EditorConfig};
use editbridge::editor::EditorSession;
use editbridge::format::parse_document;
use editbridge::model::{Document, PageId};
use editbridge::protocol::OutboundMessage;
use editbridge::runtime::{EditorHost, HostEvent};
use editbridge::server::{self, AppState};
use editbridge::store::{PageEditFolder, WriteDurability};

const LOG_ENV: &str = "EDITBRIDGE_LOG";

/// Headless inline editor and page-edit server
#[derive(Parser, Debug)]
#[command(name = "editbridge", version, about, long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the page-edit endpoints
    Serve(ServeArgs),
    /// Edit a page over stdio JSON lines
    Edit(EditArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Directory holding one edits file per page
    #[arg(long, value_name = "DIR")]
    pages: Option<PathBuf>,

    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (0 = ephemeral)
    #[arg(long)]
    port: Option<u16>,

    /// Bearer token required by every endpoint
    #[arg(long)]
    token: Option<String>,

    /// fsync writes where supported
    #[arg(long)]
    durable_writes: bool,
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Page markup to edit
    #[arg(value_name = "PAGE")]
    page: PathBuf,

    /// Directory holding one edits file per page
    #[arg(long, value_name = "DIR")]
    pages: Option<PathBuf>,

    /// Page id; defaults to one derived from --location
    #[arg(long)]
    page_id: Option<String>,

    /// Preview location path the page id is derived from (`/t/v1/<id>`)
    #[arg(long, value_name = "PATH")]
    location: Option<String>,

    /// Persist through a running page-edit server instead of the pages directory
    #[arg(long, value_name = "URL", conflicts_with = "pages")]
    server: Option<String>,

    /// Bearer token sent to --server
    #[arg(long, requires = "server")]
    token: Option<String>,

    /// Edit without persisting anything
    #[arg(long, conflicts_with = "server")]
    anonymous: bool,

    /// Write the final markup here on exit
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// fsync writes where supported
    #[arg(long)]
    durable_writes: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())
        .with_context(|| "failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    match cli.command {
        Command::Serve(args) => runtime.block_on(run_serve(config, args)),
        Command::Edit(args) => runtime.block_on(run_edit(config, args)),
    }
}

fn durability(flag: bool, config: &Config) -> WriteDurability {
    if flag {
        WriteDurability::Durable
    } else {
        config.server.durability()
    }
}

async fn run_serve(config: Config, args: ServeArgs) -> Result<()> {
    let pages = args.pages.unwrap_or_else(|| config.server.pages_dir.clone());
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let port = args.port.unwrap_or(config.server.port);
    let token = args.token.or_else(|| config.server.token.clone());
    let folder =
        PageEditFolder::new(pages).with_durability(durability(args.durable_writes, &config));

    let listener = TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    if token.is_none() {
        warn!("no bearer token configured; every request counts as signed in");
    }
    let state = AppState::new(folder, token);
    server::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("page edit server failed")?;
    Ok(())
}

async fn run_edit(config: Config, args: EditArgs) -> Result<()> {
    let markup = tokio::fs::read_to_string(&args.page)
        .await
        .with_context(|| format!("failed to read {}", args.page.display()))?;
    let doc = parse_document(&markup)
        .with_context(|| format!("failed to parse {}", args.page.display()))?;

    let page_id = match (&args.page_id, &args.location) {
        (Some(id), _) => PageId::new(id.as_str()).context("invalid --page-id")?,
        (None, Some(location)) => PageId::from_location_path(location),
        (None, None) => PageId::default_page(),
    };

    if let Some(server) = &args.server {
        let token = args.token.clone().or_else(|| config.server.token.clone());
        let backend = HttpBackend::new(server, token)
            .with_context(|| format!("invalid --server {server}"))?;
        info!(server = %backend.base(), "persisting through page edit server");
        return edit_with(doc, page_id, config.editor, backend, args.out.as_deref()).await;
    }

    let pages = args.pages.unwrap_or_else(|| config.server.pages_dir.clone());
    let folder =
        PageEditFolder::new(pages).with_durability(durability(args.durable_writes, &config));
    let backend = if args.anonymous {
        FolderBackend::anonymous(folder)
    } else {
        FolderBackend::new(folder)
    };
    edit_with(doc, page_id, config.editor, backend, args.out.as_deref()).await
}

async fn edit_with<B: PageEditBackend>(
    doc: Document,
    page_id: PageId,
    config: EditorConfig,
    backend: B,
    out: Option<&Path>,
) -> Result<()> {
    let host = EditorHost::start(doc, page_id, config, Arc::new(backend))
        .await
        .context("failed to inject editor")?;

    let (events_tx, events_rx) = mpsc::channel::<HostEvent>(64);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<OutboundMessage>();

    let writer = tokio::spawn(write_outbound(outbound_rx));
    let reader = tokio::spawn(read_events(events_tx));

    let session = host.run(events_rx, outbound_tx).await;
    reader.await.context("stdin reader panicked")??;
    writer.await.context("stdout writer panicked")??;

    if let Some(out) = out {
        write_snapshot(&session, out).await?;
    }
    info!(page_id = %session.page_id(), "editing finished");
    Ok(())
}

async fn read_events(events: mpsc::Sender<HostEvent>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!(error = %err, "ignoring malformed host event"),
        }
    }
    Ok(())
}

async fn write_outbound(mut outbound: mpsc::UnboundedReceiver<OutboundMessage>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = outbound.recv().await {
        let mut line = serde_json::to_vec(&message).context("failed to encode message")?;
        line.push(b'\n');
        stdout.write_all(&line).await.context("failed to write stdout")?;
        stdout.flush().await.context("failed to flush stdout")?;
    }
    Ok(())
}

async fn write_snapshot(session: &EditorSession, out: &Path) -> Result<()> {
    tokio::fs::write(out, session.snapshot_markup())
        .await
        .with_context(|| format!("failed to write {}", out.display()))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "editbridge",
            "serve",
            "--pages",
            "edits",
            "--port",
            "0",
            "--durable-writes",
        ])
        .expect("parse args");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(0));
        assert!(args.durable_writes);
        assert_eq!(args.pages.as_deref(), Some(std::path::Path::new("edits")));
    }

    #[test]
    fn parses_edit_with_global_config() {
        let cli = Cli::try_parse_from([
            "editbridge",
            "edit",
            "page.html",
            "--location",
            "/t/v1/bakery-home",
            "--config",
            "editbridge.toml",
            "--anonymous",
        ])
        .expect("parse args");
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("editbridge.toml")));
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert!(args.anonymous);
        assert_eq!(args.location.as_deref(), Some("/t/v1/bakery-home"));
    }

    #[test]
    fn parses_edit_against_a_server() {
        let cli = Cli::try_parse_from([
            "editbridge",
            "edit",
            "page.html",
            "--server",
            "http://127.0.0.1:4000",
            "--token",
            "s3cret",
        ])
        .expect("parse args");
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.server.as_deref(), Some("http://127.0.0.1:4000"));
        assert_eq!(args.token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn server_excludes_anonymous_and_pages() {
        Cli::try_parse_from([
            "editbridge",
            "edit",
            "page.html",
            "--server",
            "http://127.0.0.1:4000",
            "--anonymous",
        ])
        .unwrap_err();
        Cli::try_parse_from([
            "editbridge",
            "edit",
            "page.html",
            "--server",
            "http://127.0.0.1:4000",
            "--pages",
            "edits",
        ])
        .unwrap_err();
        Cli::try_parse_from(["editbridge", "edit", "page.html", "--token", "s3cret"]).unwrap_err();
    }

    #[test]
    fn rejects_missing_subcommand() {
        Cli::try_parse_from(["editbridge"]).unwrap_err();
    }

    #[test]
    fn rejects_unknown_flags() {
        Cli::try_parse_from(["editbridge", "serve", "--nope"]).unwrap_err();
    }
}
