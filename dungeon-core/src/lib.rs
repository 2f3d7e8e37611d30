//! Text adventure engine with an AI Dungeon Master.
//!
//! This crate provides:
//! - A rolling memory that keeps an endless adventure inside a bounded prompt
//! - A Dungeon Master that narrates turns and compacts old ones into a journal
//! - A pluggable completion service with Gemini model selection
//! - A shareable game session with player-facing payloads
//!
//! # Quick Start
//!
//! ```ignore
//! use dungeon_core::{GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = GameSession::from_env(SessionConfig::new())?;
//!
//!     let start = session.start("pirate").await;
//!     println!("{}", start.opening);
//!
//!     let turn = session.play("I climb the rigging").await;
//!     println!("{}", turn.story);
//!     Ok(())
//! }
//! ```

pub mod dm;
pub mod provider;
pub mod session;
pub mod testing;

// Primary public API
pub use dm::{DmConfig, DmError, DungeonMaster};
pub use provider::{CompletionError, CompletionService, ModelPreference};
pub use session::{
    GameSession, PlayResponse, ResetResponse, SessionConfig, SessionError, StartResponse,
    UndoResponse,
};
pub use testing::{MockCompletion, MockResponse, TestHarness};
