//! DM Memory for context management.
//!
//! Keeps an unbounded adventure inside a bounded prompt by splitting state in
//! two: a compact long-term summary (the "journal") and a short window of
//! verbatim recent turns. Turns that fall out of the window are handed back to
//! the caller so they can be folded into the summary.

use serde::{Deserialize, Serialize};

/// Summary used for a fresh game.
pub const INITIAL_SUMMARY: &str = "The adventure begins.";

/// Maximum number of recent lines kept verbatim (three player/DM pairs).
pub const HISTORY_LIMIT: usize = 6;

/// Prefix for player lines in the recent history.
pub const PLAYER_PREFIX: &str = "Player: ";

/// Prefix for narrator lines in the recent history.
pub const DM_PREFIX: &str = "DM: ";

/// DM Memory holds the narrative state of the single active game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmMemory {
    /// Condensed memory of everything older than the recent window.
    summary: String,

    /// Verbatim lines, alternating player and DM, newest last.
    recent_history: Vec<String>,

    /// Theme picked when the game was started.
    genre: Option<String>,
}

impl DmMemory {
    /// Create memory for a fresh game.
    pub fn new() -> Self {
        Self {
            summary: INITIAL_SUMMARY.to_string(),
            recent_history: Vec::new(),
            genre: None,
        }
    }

    /// Forget everything and go back to the initial summary.
    pub fn reset(&mut self) {
        self.summary = INITIAL_SUMMARY.to_string();
        self.recent_history.clear();
        self.genre = None;
    }

    /// Begin a new adventure in the given genre.
    ///
    /// Only the memory is touched; narrating the opening scene is the DM's job.
    pub fn start_new(&mut self, genre: &str) {
        self.recent_history.clear();
        self.summary = format!("The player has started a {genre} adventure.");
        self.genre = Some(genre.to_string());
    }

    /// Record one completed exchange, player line first.
    pub fn append_turn(&mut self, player_line: impl Into<String>, response_line: impl Into<String>) {
        self.recent_history.push(player_line.into());
        self.recent_history.push(response_line.into());
    }

    /// Remove the most recent player/DM pair.
    ///
    /// Returns the removed `(player, response)` lines, or `None` when there is
    /// no complete pair to remove.
    pub fn undo_last_turn(&mut self) -> Option<(String, String)> {
        if self.recent_history.len() < 2 {
            return None;
        }

        let response = self.recent_history.pop()?;
        let player = self.recent_history.pop()?;
        Some((player, response))
    }

    /// Evict the oldest pair once the history grows past `threshold`.
    ///
    /// The two evicted lines are returned joined by a newline. They leave the
    /// window immediately, whatever happens to them afterwards.
    pub fn take_oldest_pair_if_overflow(&mut self, threshold: usize) -> Option<String> {
        if self.recent_history.len() <= threshold.max(1) {
            return None;
        }

        let evicted: Vec<String> = self.recent_history.drain(..2).collect();
        Some(evicted.join("\n"))
    }

    /// The long-term summary.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Replace the long-term summary. Blank summaries are ignored.
    pub fn set_summary(&mut self, summary: impl Into<String>) {
        let summary = summary.into();
        if !summary.trim().is_empty() {
            self.summary = summary;
        }
    }

    /// The verbatim recent lines, oldest first.
    pub fn recent_history(&self) -> &[String] {
        &self.recent_history
    }

    /// The genre of the current adventure, if one was started.
    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    /// Get the number of stored lines.
    pub fn message_count(&self) -> usize {
        self.recent_history.len()
    }

    /// Serializable copy of the current state.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            summary: self.summary.clone(),
            recent_history: self.recent_history.clone(),
            genre: self.genre.clone(),
        }
    }
}

impl Default for DmMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the DM memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub summary: String,
    pub recent_history: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_turns(turns: usize) -> DmMemory {
        let mut memory = DmMemory::new();
        for i in 0..turns {
            memory.append_turn(format!("Player: action {i}"), format!("DM: result {i}"));
        }
        memory
    }

    #[test]
    fn test_memory_creation() {
        let memory = DmMemory::new();
        assert_eq!(memory.summary(), INITIAL_SUMMARY);
        assert_eq!(memory.message_count(), 0);
        assert!(memory.genre().is_none());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut memory = memory_with_turns(2);
        memory.start_new("horror");
        memory.append_turn("Player: run", "DM: you run");

        memory.reset();
        let once = memory.clone();
        memory.reset();

        assert_eq!(memory, once);
        assert_eq!(memory.summary(), INITIAL_SUMMARY);
        assert!(memory.recent_history().is_empty());
        assert!(memory.genre().is_none());
    }

    #[test]
    fn test_start_new_sets_genre_summary() {
        let mut memory = memory_with_turns(3);
        memory.start_new("pirate");

        assert_eq!(memory.summary(), "The player has started a pirate adventure.");
        assert!(memory.recent_history().is_empty());
        assert_eq!(memory.genre(), Some("pirate"));
    }

    #[test]
    fn test_append_turn_keeps_order() {
        let mut memory = DmMemory::new();
        memory.append_turn("Player: open door", "DM: it creaks");

        assert_eq!(
            memory.recent_history(),
            &["Player: open door".to_string(), "DM: it creaks".to_string()]
        );
    }

    #[test]
    fn test_undo_removes_last_pair() {
        let mut memory = memory_with_turns(2);

        let removed = memory.undo_last_turn();

        assert_eq!(
            removed,
            Some(("Player: action 1".to_string(), "DM: result 1".to_string()))
        );
        assert_eq!(
            memory.recent_history(),
            &["Player: action 0".to_string(), "DM: result 0".to_string()]
        );
    }

    #[test]
    fn test_undo_with_short_history_is_noop() {
        let mut memory = DmMemory::new();
        assert!(memory.undo_last_turn().is_none());

        memory.recent_history.push("Player: dangling".to_string());
        assert!(memory.undo_last_turn().is_none());
        assert_eq!(memory.message_count(), 1);
    }

    #[test]
    fn test_no_eviction_at_threshold() {
        let mut memory = memory_with_turns(3);
        assert!(memory.take_oldest_pair_if_overflow(HISTORY_LIMIT).is_none());
        assert_eq!(memory.message_count(), 6);
    }

    #[test]
    fn test_zero_threshold_keeps_lone_line() {
        let mut memory = DmMemory::new();
        memory.recent_history.push("Player: dangling".to_string());

        assert!(memory.take_oldest_pair_if_overflow(0).is_none());
        assert_eq!(memory.message_count(), 1);

        memory.recent_history.push("DM: caught".to_string());
        let evicted = memory.take_oldest_pair_if_overflow(0);
        assert_eq!(evicted.as_deref(), Some("Player: dangling\nDM: caught"));
        assert_eq!(memory.message_count(), 0);
    }

    #[test]
    fn test_eviction_over_threshold() {
        let mut memory = memory_with_turns(4);

        let evicted = memory.take_oldest_pair_if_overflow(HISTORY_LIMIT);

        assert_eq!(evicted.as_deref(), Some("Player: action 0\nDM: result 0"));
        assert_eq!(memory.message_count(), 6);
        assert_eq!(memory.recent_history()[0], "Player: action 1");
        assert_eq!(memory.recent_history()[5], "DM: result 3");
    }

    #[test]
    fn test_set_summary_ignores_blank() {
        let mut memory = DmMemory::new();
        memory.set_summary("   ");
        assert_eq!(memory.summary(), INITIAL_SUMMARY);

        memory.set_summary("The hero holds the key.");
        assert_eq!(memory.summary(), "The hero holds the key.");
    }

    #[test]
    fn test_snapshot() {
        let mut memory = memory_with_turns(1);
        memory.set_summary("Somewhere dark.");

        let snapshot = memory.snapshot();
        assert_eq!(snapshot.summary, "Somewhere dark.");
        assert_eq!(snapshot.recent_history.len(), 2);
        assert!(snapshot.genre.is_none());
    }
}
