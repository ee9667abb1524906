//! distkv-admin - DistKV node administration.
//!
//! Prepares a node for the DistKV daemon and keeps its state directory
//! tidy:
//! - Service user, environment defaults and systemd units
//! - Base snapshot (`0.dkv`) in a dated state directory
//! - Consolidation of numbered `.dkv` fragments

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use distkv_admin::config::{Config, DEFAULT_ENV_FILE};
use distkv_admin::service::{SYSTEMD_UNIT_DIR, SYSUSERS_DIR};

#[derive(Parser)]
#[command(name = "distkv-admin")]
#[command(about = "DistKV node administration")]
#[command(
    after_help = "QUICK START:\n  distkv-admin preflight  Check the node is ready\n  distkv-admin init       Create the snapshot and start distkv\n  distkv-admin rotate     Consolidate the newest state directory\n  distkv-admin latest     Print the newest snapshot"
)]
struct Cli {
    /// Environment file shared with distkv.service
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Verbose diagnostics (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the node: user, env defaults, snapshot, units
    Init {
        /// Skip systemd-sysusers and systemctl (containers, chroots)
        #[arg(long)]
        no_systemd: bool,
        /// Leave snapshot ownership unchanged
        #[arg(long)]
        no_chown: bool,
    },

    /// Concatenate all fragments of the newest state directory
    Rotate {
        /// Output file (default: $TEMP/<state-dir>.dkv)
        output: Option<PathBuf>,
        /// State directory to consolidate instead of the newest
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print the newest initialized snapshot
    Latest,

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Install systemd units and the sysusers.d entry
    InstallUnits {
        /// systemd unit directory
        #[arg(long, default_value = SYSTEMD_UNIT_DIR)]
        dir: PathBuf,
        /// sysusers.d directory
        #[arg(long, default_value = SYSUSERS_DIR)]
        sysusers_dir: PathBuf,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Run preflight checks (verify the node before init)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// List fragments of the newest (or given) state directory
    Fragments {
        /// State directory (default: newest under DEST)
        dir: Option<PathBuf>,
    },
    /// Print the unit files install-units would write
    Units,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init {
            no_systemd,
            no_chown,
        } => {
            commands::cmd_init(&cli.env_file, no_systemd, no_chown)?;
        }

        Commands::Rotate { output, dir } => {
            let config = Config::load(&cli.env_file)?;
            commands::cmd_rotate(&config, output, dir)?;
        }

        Commands::Latest => {
            let config = Config::load(&cli.env_file)?;
            commands::cmd_latest(&config)?;
        }

        Commands::Show { what } => {
            let config = Config::load(&cli.env_file)?;
            let show_target = match what {
                ShowTarget::Config { json } => commands::show::ShowTarget::Config { json },
                ShowTarget::Fragments { dir } => commands::show::ShowTarget::Fragments { dir },
                ShowTarget::Units => commands::show::ShowTarget::Units,
            };
            commands::cmd_show(show_target, &config)?;
        }

        Commands::InstallUnits {
            dir,
            sysusers_dir,
            force,
        } => {
            let config = Config::load(&cli.env_file)?;
            commands::cmd_install_units(&config, &dir, &sysusers_dir, force)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&cli.env_file, strict)?;
        }
    }

    Ok(())
}
