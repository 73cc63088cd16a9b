//! School library service.
//!
//! Application modules (library catalog and ledger, student registry) plus the
//! bootstrap that wires them into the kernel, database and HTTP server.

pub mod app;
pub mod modules;

pub use app::{build_app, migrate, serve, App};
