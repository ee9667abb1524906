//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `init` - Initialize the node (user, env file, snapshot, units)
//! - `rotate` - Consolidate the newest state directory
//! - `latest` - Print the newest initialized snapshot
//! - `show` - Display configuration, fragments or units
//! - `units` - Install unit files
//! - `preflight` - Run preflight checks

pub mod init;
mod latest;
mod preflight;
pub mod rotate;
pub mod show;
mod units;

pub use init::cmd_init;
pub use latest::cmd_latest;
pub use preflight::cmd_preflight;
pub use rotate::cmd_rotate;
pub use show::cmd_show;
pub use units::cmd_install_units;
