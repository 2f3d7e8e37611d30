//! HTTP front end for the AI Dungeon Master.
//!
//! Exposes `start`, `play`, `undo` and `reset` (plus `journal` and `health`)
//! over JSON for a browser client.

pub mod config;
pub mod routes;

pub use config::ServerConfig;
pub use routes::build_router;
