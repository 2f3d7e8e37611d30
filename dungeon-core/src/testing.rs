//! Testing utilities for the game.
//!
//! This module provides tools for integration testing:
//! - `MockCompletion` for deterministic testing without API calls
//! - `StaticCatalog` for exercising model selection offline
//! - `TestHarness` for scripted game scenarios
//! - Assertion helpers for verifying memory state

use crate::dm::{DmConfig, DmError, DungeonMaster, Turn};
use crate::provider::{CompletionError, CompletionService, ModelCatalog};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Narration returned once the scripted responses run out.
pub const EXHAUSTED_RESPONSE: &str = "The DM has no more scripted responses.";

/// A scripted completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Succeed with this text.
    Text(String),
    /// Fail with this reason.
    Failure(String),
}

impl MockResponse {
    /// A successful completion.
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Text(text.into())
    }

    /// A failed completion.
    pub fn failure(reason: impl Into<String>) -> Self {
        MockResponse::Failure(reason.into())
    }
}

/// A completion service that returns scripted responses in order.
///
/// Every prompt it receives is recorded so tests can check exactly what the
/// DM sent.
#[derive(Debug, Default)]
pub struct MockCompletion {
    responses: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    /// Create a new mock with scripted responses.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Add a response to the queue.
    pub fn queue_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Number of scripted responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.responses).len()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        lock(&self.prompts).push(prompt.to_string());

        let next = lock(&self.responses).pop_front();
        match next {
            Some(MockResponse::Text(text)) => Ok(text),
            Some(MockResponse::Failure(reason)) => Err(CompletionError::Unavailable(reason)),
            None => Ok(EXHAUSTED_RESPONSE.to_string()),
        }
    }
}

/// A model catalog with a fixed listing.
#[derive(Debug)]
pub struct StaticCatalog {
    models: Option<Vec<String>>,
    listings: AtomicUsize,
}

impl StaticCatalog {
    /// A catalog that lists these model identifiers.
    pub fn new(models: &[&str]) -> Self {
        Self {
            models: Some(models.iter().map(|m| m.to_string()).collect()),
            listings: AtomicUsize::new(0),
        }
    }

    /// A catalog whose listing always fails.
    pub fn failing() -> Self {
        Self {
            models: None,
            listings: AtomicUsize::new(0),
        }
    }

    /// How many times the models have been listed.
    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelCatalog for StaticCatalog {
    async fn text_models(&self) -> Result<Vec<String>, CompletionError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        self.models
            .clone()
            .ok_or_else(|| CompletionError::Unavailable("model listing failed".to_string()))
    }
}

// A poisoned lock only means another test thread panicked mid-push.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Test harness for running game scenarios.
pub struct TestHarness {
    /// The scripted completion service shared with the DM.
    pub mock: Arc<MockCompletion>,
    /// The DM under test.
    pub dm: DungeonMaster,
}

impl TestHarness {
    /// Create a new test harness with default configuration.
    pub fn new() -> Self {
        Self::with_config(DmConfig::default())
    }

    /// Create a test harness with a custom DM configuration.
    pub fn with_config(config: DmConfig) -> Self {
        let mock = Arc::new(MockCompletion::default());
        let dm = DungeonMaster::new(mock.clone()).with_config(config);
        Self { mock, dm }
    }

    /// Queue a successful completion.
    pub fn expect_narrative(&mut self, text: impl Into<String>) -> &mut Self {
        self.mock.queue_response(MockResponse::text(text));
        self
    }

    /// Queue a failed completion.
    pub fn expect_failure(&mut self, reason: impl Into<String>) -> &mut Self {
        self.mock.queue_response(MockResponse::failure(reason));
        self
    }

    /// Play one turn.
    pub async fn input(&mut self, action: &str) -> Result<Turn, DmError> {
        self.dm.play_turn(action).await
    }

    /// Current journal text.
    pub fn summary(&self) -> &str {
        self.dm.memory().summary()
    }

    /// Current recent-history lines.
    pub fn history(&self) -> &[String] {
        self.dm.memory().recent_history()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the number of recent-history lines.
#[track_caller]
pub fn assert_history_len(harness: &TestHarness, expected: usize) {
    let actual = harness.history().len();
    assert_eq!(
        actual, expected,
        "Expected {expected} history lines, got {actual}: {:?}",
        harness.history()
    );
}

/// Assert the journal text.
#[track_caller]
pub fn assert_summary(harness: &TestHarness, expected: &str) {
    assert_eq!(
        harness.summary(),
        expected,
        "Expected journal '{expected}', got '{}'",
        harness.summary()
    );
}

/// Assert the invariants that must hold between turns.
#[track_caller]
pub fn assert_memory_invariants(harness: &TestHarness) {
    let history = harness.history();
    assert!(
        history.len() <= harness.dm.config().history_limit,
        "History exceeded its limit: {history:?}"
    );
    assert_eq!(history.len() % 2, 0, "History is not made of pairs: {history:?}");
    for pair in history.chunks(2) {
        assert!(pair[0].starts_with("Player: "), "Expected player line, got {:?}", pair[0]);
        assert!(pair[1].starts_with("DM: "), "Expected DM line, got {:?}", pair[1]);
    }
    assert!(!harness.summary().trim().is_empty(), "Journal is empty");
}
