// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod stale;
pub mod state;
pub mod task;
pub mod types;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::loader::load_and_validate;
use crate::engine::Engine;
use crate::errors::{BuilddagError, Result};
use crate::exec::{cancel_pair, CancelHandle};
use crate::state::BuildLock;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus command-line overrides)
/// - the engine
/// - the build lock
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;

    if let Command::Build {
        fingerprint,
        timeout,
        ..
    } = &args.command
    {
        if let Some(mode) = fingerprint {
            cfg.config.fingerprint = *mode;
        }
        if let Some(timeout) = timeout {
            types::parse_duration(timeout).map_err(BuilddagError::ConfigError)?;
            cfg.config.timeout = Some(timeout.clone());
        }
    }

    let mut engine = Engine::from_config(&cfg, &config_path)?;

    match args.command {
        Command::Build { target, .. } => {
            let _lock = BuildLock::acquire(engine.context().root())?;
            let (handle, cancel) = cancel_pair();
            spawn_ctrl_c_listener(handle);

            let report = engine.assemble(target.as_deref(), &cancel).await?;
            for task in &report.executed {
                println!("ran   {} ({})", task.name, task.reason);
            }
            for task in &report.skipped {
                println!("fresh {task}");
            }
            println!("{report}");
        }
        Command::Clean => {
            let _lock = BuildLock::acquire(engine.context().root())?;
            let report = engine.clean()?;
            for path in &report.removed {
                println!("removed {}", path.display());
            }
            println!(
                "clean: {} removed, {} already missing",
                report.removed.len(),
                report.already_missing.len()
            );
        }
        Command::Plan { target } => {
            for entry in engine.plan(target.as_deref())? {
                println!("{entry}");
            }
        }
    }

    Ok(())
}

/// Ctrl-C → cancel the running build.
fn spawn_ctrl_c_listener(handle: CancelHandle) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("interrupt received; cancelling build");
        handle.cancel();
    });
}
