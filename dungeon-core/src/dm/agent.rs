//! AI Dungeon Master agent.
//!
//! The DungeonMaster owns the game memory and turns player actions into
//! narration through a completion service. After each turn it keeps the
//! recent window bounded, compacting whatever falls out into the journal.

use super::compaction::{compact, CompactionOutcome};
use super::memory::{DmMemory, DM_PREFIX, HISTORY_LIMIT, PLAYER_PREFIX};
use super::prompts::{build_opening_prompt, build_turn_prompt};
use crate::provider::{CompletionError, CompletionService};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Opening used when the opening scene cannot be generated.
pub const FALLBACK_OPENING: &str =
    "You stand at the threshold of a new adventure, and the path ahead is yours to choose.";

/// Errors from the DM agent.
#[derive(Debug, Error)]
pub enum DmError {
    #[error("{0}")]
    Completion(#[from] CompletionError),
}

/// Configuration for the Dungeon Master.
#[derive(Debug, Clone)]
pub struct DmConfig {
    /// Recent lines kept verbatim before the oldest pair is compacted.
    pub history_limit: usize,

    /// Opening narration used when generation fails.
    pub fallback_opening: String,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            history_limit: HISTORY_LIMIT,
            fallback_opening: FALLBACK_OPENING.to_string(),
        }
    }
}

impl DmConfig {
    /// Set the recent-history limit.
    ///
    /// The limit counts lines, so it is rounded up to a whole number of
    /// player/DM pairs, with at least one pair.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        let limit = limit.max(2);
        self.history_limit = limit + limit % 2;
        self
    }

    /// Set the fallback opening narration.
    pub fn with_fallback_opening(mut self, opening: impl Into<String>) -> Self {
        self.fallback_opening = opening.into();
        self
    }
}

/// A completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// The narration returned by the model.
    pub narrative: String,

    /// Set when the turn pushed a pair out of the recent window.
    pub compaction: Option<CompactionOutcome>,
}

/// Result of an undo request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The last pair was removed; `remaining` is the history left behind.
    Undone { remaining: Vec<String> },
    /// There was no complete turn to remove.
    NothingToUndo,
}

/// The AI Dungeon Master.
pub struct DungeonMaster {
    service: Arc<dyn CompletionService>,
    summarizer: Arc<dyn CompletionService>,
    config: DmConfig,
    memory: DmMemory,
}

impl DungeonMaster {
    /// Create a DungeonMaster that narrates and summarizes with one service.
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            summarizer: service.clone(),
            service,
            config: DmConfig::default(),
            memory: DmMemory::new(),
        }
    }

    /// Configure the DungeonMaster.
    pub fn with_config(mut self, config: DmConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a separate (usually cheaper) service for journal compaction.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn CompletionService>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &DmConfig {
        &self.config
    }

    /// Get the current memory.
    pub fn memory(&self) -> &DmMemory {
        &self.memory
    }

    /// Get mutable access to memory.
    pub fn memory_mut(&mut self) -> &mut DmMemory {
        &mut self.memory
    }

    /// Start a new adventure and narrate its opening scene.
    ///
    /// Never fails: if the opening cannot be generated the configured
    /// fallback opening is returned instead.
    pub async fn start_game(&mut self, genre: &str) -> String {
        self.memory.start_new(genre);
        info!(genre, "Starting new adventure");

        let prompt = build_opening_prompt(genre);
        match self.service.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Opening scene was empty, using fallback");
                self.config.fallback_opening.clone()
            }
            Err(e) => {
                warn!(error = %e, "Opening scene generation failed, using fallback");
                self.config.fallback_opening.clone()
            }
        }
    }

    /// Process a player's action and generate a response.
    ///
    /// Memory is only touched when narration succeeds. If the turn pushes a
    /// pair out of the recent window, that pair is compacted before this
    /// returns; a failed compaction does not fail the turn.
    pub async fn play_turn(&mut self, action: &str) -> Result<Turn, DmError> {
        let prompt = build_turn_prompt(self.memory.summary(), self.memory.recent_history(), action);

        let narrative = self.service.generate(&prompt).await?;
        if narrative.trim().is_empty() {
            return Err(CompletionError::EmptyResponse.into());
        }

        self.memory
            .append_turn(format!("{PLAYER_PREFIX}{action}"), format!("{DM_PREFIX}{narrative}"));

        let compaction = match self
            .memory
            .take_oldest_pair_if_overflow(self.config.history_limit)
        {
            Some(evicted) => Some(compact(self.summarizer.as_ref(), &mut self.memory, &evicted).await),
            None => None,
        };

        info!(
            history_len = self.memory.message_count(),
            compacted = compaction.as_ref().map(CompactionOutcome::is_compacted),
            "Turn played"
        );

        Ok(Turn {
            narrative,
            compaction,
        })
    }

    /// Take back the most recent turn.
    pub fn undo_turn(&mut self) -> UndoOutcome {
        match self.memory.undo_last_turn() {
            Some(_) => UndoOutcome::Undone {
                remaining: self.memory.recent_history().to_vec(),
            },
            None => UndoOutcome::NothingToUndo,
        }
    }

    /// Throw away the current adventure.
    pub fn reset(&mut self) {
        self.memory.reset();
        info!("Game reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dm::memory::INITIAL_SUMMARY;
    use crate::testing::{MockCompletion, MockResponse};

    fn dm_with(responses: Vec<MockResponse>) -> (Arc<MockCompletion>, DungeonMaster) {
        let mock = Arc::new(MockCompletion::new(responses));
        let dm = DungeonMaster::new(mock.clone());
        (mock, dm)
    }

    #[test]
    fn test_history_limit_normalized() {
        assert_eq!(DmConfig::default().with_history_limit(0).history_limit, 2);
        assert_eq!(DmConfig::default().with_history_limit(5).history_limit, 6);
        assert_eq!(DmConfig::default().with_history_limit(8).history_limit, 8);
    }

    #[tokio::test]
    async fn test_start_game_returns_opening() {
        let (mock, mut dm) = dm_with(vec![MockResponse::text(" Waves crash against the hull. ")]);

        let opening = dm.start_game("pirate").await;

        assert_eq!(opening, "Waves crash against the hull.");
        assert_eq!(dm.memory().summary(), "The player has started a pirate adventure.");
        assert!(dm.memory().recent_history().is_empty());
        assert_eq!(
            mock.prompts(),
            vec!["You are a Dungeon Master for a pirate game. Describe the starting scene in 2 sentences. Address the player directly."]
        );
    }

    #[tokio::test]
    async fn test_start_game_falls_back_on_failure() {
        let (_mock, mut dm) = dm_with(vec![MockResponse::failure("network down")]);

        let opening = dm.start_game("noir").await;

        assert_eq!(opening, FALLBACK_OPENING);
        assert_eq!(dm.memory().summary(), "The player has started a noir adventure.");
    }

    #[tokio::test]
    async fn test_play_turn_appends_prefixed_lines() {
        let (mock, mut dm) = dm_with(vec![MockResponse::text("A goblin appears.")]);

        let turn = dm.play_turn("look around").await.unwrap();

        assert_eq!(turn.narrative, "A goblin appears.");
        assert!(turn.compaction.is_none());
        assert_eq!(
            dm.memory().recent_history(),
            &["Player: look around".to_string(), "DM: A goblin appears.".to_string()]
        );
        assert_eq!(
            mock.prompts()[0],
            "You are the Dungeon Master. \n--- JOURNAL ---\nThe adventure begins.\n--- RECENT CHAT ---\n\nPLAYER: look around\n"
        );
    }

    #[tokio::test]
    async fn test_play_turn_failure_leaves_memory_untouched() {
        let (_mock, mut dm) = dm_with(vec![MockResponse::failure("quota exceeded")]);

        let err = dm.play_turn("attack").await.unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert!(dm.memory().recent_history().is_empty());
        assert_eq!(dm.memory().summary(), INITIAL_SUMMARY);
    }

    #[tokio::test]
    async fn test_blank_narration_is_an_error() {
        let (_mock, mut dm) = dm_with(vec![MockResponse::text("   ")]);

        let result = dm.play_turn("wait").await;

        assert!(matches!(
            result,
            Err(DmError::Completion(CompletionError::EmptyResponse))
        ));
        assert_eq!(dm.memory().message_count(), 0);
    }

    #[tokio::test]
    async fn test_fourth_turn_compacts_first_pair() {
        let (mock, mut dm) = dm_with(vec![
            MockResponse::text("one"),
            MockResponse::text("two"),
            MockResponse::text("three"),
            MockResponse::text("four"),
            MockResponse::text("Journal: one happened."),
        ]);

        for action in ["a", "b", "c"] {
            let turn = dm.play_turn(action).await.unwrap();
            assert!(turn.compaction.is_none());
        }
        let turn = dm.play_turn("d").await.unwrap();

        assert_eq!(turn.narrative, "four");
        assert_eq!(turn.compaction, Some(CompactionOutcome::Compacted));
        assert_eq!(dm.memory().message_count(), 6);
        assert_eq!(dm.memory().recent_history()[0], "Player: b");
        assert_eq!(dm.memory().summary(), "Journal: one happened.");

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 5);
        assert_eq!(
            prompts[4],
            "Summarize into journal: The adventure begins. \n Add these events: Player: a\nDM: one"
        );
    }

    #[tokio::test]
    async fn test_compaction_failure_does_not_fail_turn() {
        let (_mock, mut dm) = dm_with(vec![
            MockResponse::text("one"),
            MockResponse::text("two"),
            MockResponse::failure("summarizer offline"),
        ]);
        dm = dm.with_config(DmConfig::default().with_history_limit(2));

        dm.play_turn("a").await.unwrap();
        let turn = dm.play_turn("b").await.unwrap();

        assert_eq!(turn.narrative, "two");
        assert!(matches!(turn.compaction, Some(CompactionOutcome::Failed { .. })));
        assert_eq!(dm.memory().summary(), INITIAL_SUMMARY);
        assert_eq!(
            dm.memory().recent_history(),
            &["Player: b".to_string(), "DM: two".to_string()]
        );
    }

    #[tokio::test]
    async fn test_separate_summarizer() {
        let (narrator, dm) = dm_with(vec![MockResponse::text("one"), MockResponse::text("two")]);
        let summarizer = Arc::new(MockCompletion::new(vec![MockResponse::text("Condensed.")]));
        let mut dm = dm
            .with_config(DmConfig::default().with_history_limit(2))
            .with_summarizer(summarizer.clone());

        dm.play_turn("a").await.unwrap();
        dm.play_turn("b").await.unwrap();

        assert_eq!(narrator.prompts().len(), 2);
        assert_eq!(summarizer.prompts().len(), 1);
        assert_eq!(dm.memory().summary(), "Condensed.");
    }

    #[tokio::test]
    async fn test_undo_twice() {
        let (_mock, mut dm) = dm_with(vec![MockResponse::text("one")]);
        dm.play_turn("a").await.unwrap();

        assert_eq!(dm.undo_turn(), UndoOutcome::Undone { remaining: vec![] });
        assert_eq!(dm.undo_turn(), UndoOutcome::NothingToUndo);
    }

    #[tokio::test]
    async fn test_reset() {
        let (_mock, mut dm) = dm_with(vec![MockResponse::text("opening"), MockResponse::text("one")]);
        dm.start_game("space").await;
        dm.play_turn("a").await.unwrap();

        dm.reset();

        assert_eq!(dm.memory().summary(), INITIAL_SUMMARY);
        assert!(dm.memory().recent_history().is_empty());
        assert!(dm.memory().genre().is_none());
    }
}
