//! # pilot-cli
//!
//! Command-line interface for DevPilot.
//!
//! ## Commands
//!
//! - `devpilot serve`: Start the HTTP API server
//! - `devpilot chat`: Interactive chat in the terminal
//! - `devpilot tools`: List the backend operations the agent can call
//! - `devpilot config`: Show the effective configuration

pub mod commands;

pub use commands::Cli;
