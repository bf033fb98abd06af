//! # pilot-tools
//!
//! The backend operations DevPilot can call: a fixed tool catalogue with
//! argument validation, and the HTTP client that carries the calls out.

pub mod client;
pub mod registry;

pub use client::{HttpBackend, RemoteClient};
pub use registry::{HttpMethod, IDENTITY_KEYS, Operation, RemoteRequest, ToolRegistry};
