//! opdeck RPC - JSON-RPC 2.0 front end for `opdeck-core`.
//!
//! The binary in `main.rs` parses arguments and sets up logging; everything
//! that serves requests lives here so tests can drive the router in-process.

pub mod handlers;
pub mod server;

pub use server::{build_router, start_server, AppState};
