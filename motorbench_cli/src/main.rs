#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod bench;
mod cli;
mod console;
mod error_fmt;
mod rt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use motorbench_config::{Config, Logging};
use serde_json::json;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::bench::SessionKind;
use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let _ = color_eyre::install();

    if let Commands::Inspect { file } = &cli.cmd {
        init_tracing(cli.json, cli.log_level.as_deref(), None)?;
        return bench::inspect(file, cli.json);
    }

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), Some(&cfg.logging))?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Release))
            .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Run { opts } => {
            let (summary, _) =
                bench::run_bench(&cfg, SessionKind::Interactive, &opts, cli.json, &shutdown)?;
            tracing::info!(passes = summary.passes, "bench closed");
        }
        Commands::Capture { step, opts } => {
            let (summary, path) =
                bench::run_bench(&cfg, SessionKind::Capture { step }, &opts, cli.json, &shutdown)?;
            let rows = match &summary.last_session {
                Some(motorbench_core::SessionEnd::Completed(s)) => s.rows,
                _ => 0,
            };
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "type": "capture",
                        "path": path.display().to_string(),
                        "step": step,
                        "rows": rows,
                        "missed_deadlines": summary.missed_deadlines,
                    })
                );
            } else {
                println!("Capture written to {} ({rows} rows).", path.display());
            }
        }
        Commands::SelfCheck => {
            let rpm = bench::self_check(&cfg)?;
            if cli.json {
                println!("{}", json!({ "type": "self-check", "ok": true, "rpm": rpm }));
            } else {
                println!("self-check OK ({rpm} rpm at 50% duty)");
            }
        }
        Commands::Inspect { .. } => {}
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = motorbench_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout carries only operator output.
/// Precedence for the level: RUST_LOG, then --log-level, then [logging] level.
fn init_tracing(json: bool, cli_level: Option<&str>, logging: Option<&Logging>) -> eyre::Result<()> {
    let level = cli_level
        .or_else(|| logging.and_then(|l| l.level.as_deref()))
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = match logging.and_then(|l| l.file.as_deref()) {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
            let appender = match logging.and_then(|l| l.rotation.as_deref()) {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}
