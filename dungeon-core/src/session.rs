//! GameSession - the primary public API for gameplay.
//!
//! This module wraps the DungeonMaster in a handle that can be shared across
//! request handlers. Every operation takes the session lock for its whole
//! duration, so turns never interleave. Outcomes are mapped onto the
//! player-facing payloads here; nothing below this layer fails outward.

use crate::dm::{DmConfig, DungeonMaster, MemorySnapshot, UndoOutcome};
use crate::provider::{
    CatalogResolver, CompletionService, FixedModel, GeminiService, ModelPreference, ModelResolver,
};
use gemini::Gemini;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Message returned by a successful reset.
pub const RESET_MESSAGE: &str = "Reset complete.";

/// Message returned when an undo removed a turn.
pub const UNDONE_MESSAGE: &str = "Last turn undone.";

/// Message returned when there was nothing to undo.
pub const NOTHING_TO_UNDO_MESSAGE: &str = "Nothing to undo.";

/// Errors from GameSession construction.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No API key configured - set GEMINI_KEY environment variable")]
    NoApiKey,
}

/// Configuration for creating a new game session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Model to use. When unset the model is picked from the account's list.
    pub model: Option<String>,

    /// Preference order used when the model is picked from the list.
    pub model_preference: ModelPreference,

    /// Maximum tokens per generated response.
    pub max_output_tokens: Option<usize>,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// DM behaviour.
    pub dm: DmConfig,
}

impl SessionConfig {
    /// Create a session config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use this model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the model preference order.
    pub fn with_model_preference(mut self, preference: ModelPreference) -> Self {
        self.model_preference = preference;
        self
    }

    /// Set max tokens for responses.
    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Set temperature for generation.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set the DM configuration.
    pub fn with_dm_config(mut self, dm: DmConfig) -> Self {
        self.dm = dm;
        self
    }

    /// Build the Gemini-backed completion service this config describes.
    pub fn build_service(&self, client: Gemini) -> GeminiService {
        let resolver: Arc<dyn ModelResolver> = match self.model {
            Some(ref model) => Arc::new(FixedModel(model.clone())),
            None => Arc::new(
                CatalogResolver::new(Arc::new(client.clone()))
                    .with_preference(self.model_preference.clone()),
            ),
        };

        let mut service = GeminiService::new(client).with_resolver(resolver);
        if let Some(max) = self.max_output_tokens {
            service = service.with_max_output_tokens(max);
        }
        if let Some(temp) = self.temperature {
            service = service.with_temperature(temp);
        }
        service
    }
}

/// Payload for `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub message: String,
    pub opening: String,
}

/// Payload for `play`. On failure `story` carries the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayResponse {
    pub story: String,
}

/// Payload for `undo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<Vec<String>>,
}

/// Payload for `reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
}

/// A single-player game session.
///
/// This is the main entry point for gameplay. It manages:
/// - The AI Dungeon Master and its memory
/// - Serialized access from concurrent callers
pub struct GameSession {
    dm: Mutex<DungeonMaster>,
}

impl GameSession {
    /// Create a session backed by Gemini.
    ///
    /// Requires `GEMINI_KEY` (or `GEMINI_API_KEY`) to be set.
    pub fn from_env(config: SessionConfig) -> Result<Self, SessionError> {
        let client = Gemini::from_env().map_err(|_| SessionError::NoApiKey)?;
        let service = config.build_service(client);
        Ok(Self::with_service(Arc::new(service), config.dm))
    }

    /// Create a session around any completion service.
    pub fn with_service(service: Arc<dyn CompletionService>, config: DmConfig) -> Self {
        Self::with_dm(DungeonMaster::new(service).with_config(config))
    }

    /// Create a session around a pre-configured DM.
    pub fn with_dm(dm: DungeonMaster) -> Self {
        Self { dm: Mutex::new(dm) }
    }

    /// Start a new adventure in `genre`.
    pub async fn start(&self, genre: &str) -> StartResponse {
        let mut dm = self.dm.lock().await;
        let opening = dm.start_game(genre).await;
        StartResponse {
            message: format!("New {genre} adventure started."),
            opening,
        }
    }

    /// Play one turn. Failures come back as story text.
    pub async fn play(&self, action: &str) -> PlayResponse {
        let mut dm = self.dm.lock().await;
        match dm.play_turn(action).await {
            Ok(turn) => PlayResponse {
                story: turn.narrative,
            },
            Err(e) => {
                warn!(error = %e, "Turn failed");
                PlayResponse {
                    story: format!("Error: {e}"),
                }
            }
        }
    }

    /// Take back the most recent turn.
    pub async fn undo(&self) -> UndoResponse {
        let mut dm = self.dm.lock().await;
        match dm.undo_turn() {
            UndoOutcome::Undone { remaining } => UndoResponse {
                message: UNDONE_MESSAGE.to_string(),
                remaining: Some(remaining),
            },
            UndoOutcome::NothingToUndo => UndoResponse {
                message: NOTHING_TO_UNDO_MESSAGE.to_string(),
                remaining: None,
            },
        }
    }

    /// Throw away the current adventure.
    pub async fn reset(&self) -> ResetResponse {
        self.dm.lock().await.reset();
        ResetResponse {
            message: RESET_MESSAGE.to_string(),
        }
    }

    /// Current journal and recent history.
    pub async fn journal(&self) -> MemorySnapshot {
        self.dm.lock().await.memory().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dm::memory::INITIAL_SUMMARY;
    use crate::testing::{MockCompletion, MockResponse};

    fn session_with(responses: Vec<MockResponse>) -> GameSession {
        GameSession::with_service(Arc::new(MockCompletion::new(responses)), DmConfig::default())
    }

    #[test]
    fn test_session_config() {
        let config = SessionConfig::new()
            .with_model("gemini-1.5-pro")
            .with_max_output_tokens(512)
            .with_temperature(0.9)
            .with_dm_config(DmConfig::default().with_history_limit(4));

        assert_eq!(config.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.max_output_tokens, Some(512));
        assert_eq!(config.temperature, Some(0.9));
        assert_eq!(config.dm.history_limit, 4);
    }

    #[tokio::test]
    async fn test_start_payload() {
        let session = session_with(vec![MockResponse::text("A ship rocks beneath you.")]);

        let response = session.start("pirate").await;

        assert_eq!(response.message, "New pirate adventure started.");
        assert_eq!(response.opening, "A ship rocks beneath you.");
        let journal = session.journal().await;
        assert_eq!(journal.summary, "The player has started a pirate adventure.");
        assert_eq!(journal.genre.as_deref(), Some("pirate"));
    }

    #[tokio::test]
    async fn test_play_failure_is_story_text() {
        let session = session_with(vec![MockResponse::failure("quota exceeded")]);

        let response = session.play("attack").await;

        assert_eq!(response.story, "Error: completion service unavailable: quota exceeded");
        assert!(session.journal().await.recent_history.is_empty());
    }

    #[tokio::test]
    async fn test_undo_payloads() {
        let session = session_with(vec![MockResponse::text("one"), MockResponse::text("two")]);
        session.play("a").await;
        session.play("b").await;

        let first = session.undo().await;
        assert_eq!(first.message, UNDONE_MESSAGE);
        assert_eq!(
            first.remaining,
            Some(vec!["Player: a".to_string(), "DM: one".to_string()])
        );

        session.undo().await;
        let last = session.undo().await;
        assert_eq!(last.message, NOTHING_TO_UNDO_MESSAGE);
        assert!(last.remaining.is_none());
    }

    #[tokio::test]
    async fn test_reset_payload() {
        let session = session_with(vec![MockResponse::text("one")]);
        session.play("a").await;

        assert_eq!(session.reset().await.message, RESET_MESSAGE);
        assert_eq!(session.reset().await.message, RESET_MESSAGE);

        let journal = session.journal().await;
        assert_eq!(journal.summary, INITIAL_SUMMARY);
        assert!(journal.recent_history.is_empty());
    }

    #[test]
    fn test_undo_payload_serialization() {
        let nothing = UndoResponse {
            message: NOTHING_TO_UNDO_MESSAGE.to_string(),
            remaining: None,
        };
        let json = serde_json::to_value(&nothing).unwrap();
        assert!(json.get("remaining").is_none());

        let undone = UndoResponse {
            message: UNDONE_MESSAGE.to_string(),
            remaining: Some(vec![]),
        };
        let json = serde_json::to_value(&undone).unwrap();
        assert_eq!(json["remaining"], serde_json::json!([]));
    }
}
