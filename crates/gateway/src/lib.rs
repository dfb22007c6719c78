//! HTTP surface for botline.
//!
//! Maps caller requests onto catalog commands, runs them through the relay
//! core, and renders aggregated results (or a typed error) as JSON. Also
//! serves stored attachment files and the endpoint status/inbox views.

pub mod archive;
pub mod attachments;
pub mod catalog;
pub mod routes;
pub mod server;
pub mod state;

pub use {
    catalog::{CommandCatalog, CommandSpec},
    server::{build_router, build_runtime, start_gateway},
    state::AppState,
};
