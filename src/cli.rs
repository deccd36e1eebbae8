// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::FingerprintMode;

/// Command-line arguments for `builddag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "builddag",
    version,
    about = "Incrementally build generated sources and the executable that uses them.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Builddag.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Builddag.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run every stale task needed for TARGET.
    Build {
        /// Task to build; defaults to `[config].default_target`.
        target: Option<String>,

        /// Override `[config].fingerprint`.
        #[arg(long, value_name = "MODE", value_parser = parse_fingerprint)]
        fingerprint: Option<FingerprintMode>,

        /// Override `[config].timeout` (e.g. `30s`, `10m`).
        #[arg(long, value_name = "DURATION")]
        timeout: Option<String>,
    },

    /// Delete generated outputs recorded by earlier builds.
    Clean,

    /// Show which tasks a build would run, without running them.
    Plan {
        /// Task to plan for; defaults to `[config].default_target`.
        target: Option<String>,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_fingerprint(s: &str) -> Result<FingerprintMode, String> {
    s.parse()
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_accepts_overrides() {
        let args = CliArgs::try_parse_from([
            "builddag",
            "--config",
            "ci/Builddag.toml",
            "build",
            "compile",
            "--fingerprint",
            "hash",
            "--timeout",
            "30s",
        ])
        .unwrap();

        assert_eq!(args.config, "ci/Builddag.toml");
        match args.command {
            Command::Build {
                target,
                fingerprint,
                timeout,
            } => {
                assert_eq!(target.as_deref(), Some("compile"));
                assert_eq!(fingerprint, Some(FingerprintMode::Content));
                assert_eq!(timeout.as_deref(), Some("30s"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn clean_takes_no_target() {
        assert!(CliArgs::try_parse_from(["builddag", "clean", "compile"]).is_err());
    }
}
