//! Show command - displays information.

use anyhow::{bail, Result};
use std::fmt::Write;
use std::path::PathBuf;

use distkv_admin::config::Config;
use distkv_admin::{rotate, service, snapshot};

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config { json: bool },
    /// Show fragments of a state directory
    Fragments { dir: Option<PathBuf> },
    /// Show rendered unit files
    Units,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config { json: true } => {
            println!("{}", config.to_json()?);
        }
        ShowTarget::Config { json: false } => {
            config.print();
        }
        ShowTarget::Fragments { dir } => {
            print!("{}", fragment_listing(config, dir)?);
        }
        ShowTarget::Units => {
            let admin = std::env::current_exe()?;
            for unit in service::render_units(&admin, config) {
                println!("# {}", unit.name);
                println!("{}", unit.contents);
            }
        }
    }
    Ok(())
}

/// Fragments of the newest (or given) state directory, one line each, in
/// consolidation order.
fn fragment_listing(config: &Config, dir: Option<PathBuf>) -> Result<String> {
    let request = rotate::RotateRequest { dir, output: None };
    let dir = rotate::resolve_state_dir(config, &request)?;
    let fragments = snapshot::list_fragments(&dir)?;
    if fragments.is_empty() {
        bail!("No fragments in {}", dir.display());
    }

    let mut out = String::new();
    writeln!(out, "{}:", dir.display())?;
    let mut total = 0u64;
    for fragment in &fragments {
        total += fragment.size;
        writeln!(
            out,
            "  {:>6}  {:>12}  {}",
            fragment.index,
            fragment.size,
            fragment.path.display()
        )?;
    }
    writeln!(out, "  {} fragment(s), {} bytes", fragments.len(), total)?;
    Ok(out)
}
