//! distkv-admin library exports.
//!
//! The binary is a thin clap front end over these modules; integration
//! tests drive them directly.

pub mod config;
pub mod preflight;
pub mod process;
pub mod rotate;
pub mod service;
pub mod setup;
pub mod snapshot;
pub mod timing;
pub mod users;
