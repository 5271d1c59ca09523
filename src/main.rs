mod accounts;
mod attendance;
mod auth;
mod booking;
mod capacity;
mod catalog;
mod config;
mod db;
mod error;
mod ipc;
mod ratelimit;
mod roster;
mod school;
mod settings;
mod validation;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "bookingd",
    version,
    about = "Activity booking sidecar speaking JSON lines on stdio"
)]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "BOOKING_DB_PATH")]
    db: Option<PathBuf>,

    /// Load environment variables from this file instead of `.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer requests read from stdin (default).
    Serve,
    /// Create the database schema and exit.
    InitDb,
    /// Add an administrator account.
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BOOKING_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    // Parsed twice: the env file must be loaded before clap resolves `env = ...` args.
    let early = Cli::parse();
    match early.env_file.as_deref() {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    let cli = Cli::parse();
    init_tracing();

    let mut config = config::Config::from_env();
    if let Some(path) = cli.db {
        config.db_path = path;
    }
    let conn = db::open_db(&config.db_path)?;
    tracing::info!(db = %config.db_path.display(), "database ready");

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => Ok(()),
        Command::CreateAdmin {
            name,
            email,
            password,
        } => {
            let admin = accounts::create_admin(&conn, &name, &email, &password)?;
            println!("{}", serde_json::to_string(&admin)?);
            Ok(())
        }
        Command::Serve => {
            let identity = auth::identity::provider_from_config(&config)?;
            let state = ipc::AppState::new(config, conn, identity);
            serve(state);
            Ok(())
        }
    }
}

fn serve(mut state: ipc::AppState) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, shutting down");
}
