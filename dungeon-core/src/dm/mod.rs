//! AI Dungeon Master module.
//!
//! Contains the DM agent, its rolling memory, the compaction step that keeps
//! that memory bounded, and the prompts sent to the model.

mod agent;
pub mod compaction;
pub mod memory;
pub mod prompts;

pub use agent::{DmConfig, DmError, DungeonMaster, Turn, UndoOutcome, FALLBACK_OPENING};
pub use compaction::CompactionOutcome;
pub use memory::{DmMemory, MemorySnapshot, HISTORY_LIMIT, INITIAL_SUMMARY};
