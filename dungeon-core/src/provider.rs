//! Completion service seam.
//!
//! The DM only ever needs "prompt in, text out". This module defines that
//! contract, the model-selection strategy that runs before every call, and the
//! Gemini-backed implementation.

use async_trait::async_trait;
use gemini::{Gemini, Request};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Newest model family we know about.
pub const NEWEST_FAMILY: &str = "gemini-2.5-flash";

/// Standard model family used when the newest one is not offered.
pub const STANDARD_FAMILY: &str = "gemini-1.5-flash";

/// Markers of variants that accept `generateContent` but do not narrate text.
const NON_TEXT_MARKERS: &[&str] = &["-tts", "-image", "-live", "embedding"];

fn is_text_model(model: &str) -> bool {
    !NON_TEXT_MARKERS.iter().any(|marker| model.contains(marker))
}

/// Errors from a completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("{0}")]
    Provider(#[from] gemini::Error),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

/// An opaque text-completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate text for a prompt. One attempt, no retries.
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Source of the models available to the caller.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Identifiers of models that can generate text, in provider order.
    async fn text_models(&self) -> Result<Vec<String>, CompletionError>;
}

/// Strategy that picks the model for the next call.
///
/// Resolution never fails: implementations fall back to a default identifier.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    async fn resolve_model(&self) -> String;
}

/// Model families in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPreference {
    /// Preferred when present.
    pub newest: String,
    /// Used when the newest family is missing.
    pub standard: String,
    /// Used when nothing can be listed.
    pub default: String,
}

impl Default for ModelPreference {
    fn default() -> Self {
        Self {
            newest: NEWEST_FAMILY.to_string(),
            standard: STANDARD_FAMILY.to_string(),
            default: gemini::DEFAULT_MODEL.to_string(),
        }
    }
}

impl ModelPreference {
    /// Pick a model from the available identifiers.
    ///
    /// Newest family, then standard family, then the first model offered,
    /// then the default identifier for an empty list. Within a family the
    /// exact identifier wins over versioned ones, and speech, image, live and
    /// embedding variants are never picked by family.
    pub fn select(&self, available: &[String]) -> String {
        let family = |name: &str| {
            available
                .iter()
                .find(|model| model.as_str() == name)
                .or_else(|| {
                    available
                        .iter()
                        .find(|model| model.starts_with(name) && is_text_model(model))
                })
                .cloned()
        };

        family(&self.newest)
            .or_else(|| family(&self.standard))
            .or_else(|| available.iter().find(|model| is_text_model(model)).cloned())
            .or_else(|| available.first().cloned())
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Always uses the same model.
#[derive(Debug, Clone)]
pub struct FixedModel(pub String);

#[async_trait]
impl ModelResolver for FixedModel {
    async fn resolve_model(&self) -> String {
        self.0.clone()
    }
}

/// Lists the available models on every call and applies a [`ModelPreference`].
///
/// Nothing is cached, so a model disappearing from the account never breaks
/// more than the lookup that noticed it.
pub struct CatalogResolver {
    catalog: Arc<dyn ModelCatalog>,
    preference: ModelPreference,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn ModelCatalog>) -> Self {
        Self {
            catalog,
            preference: ModelPreference::default(),
        }
    }

    pub fn with_preference(mut self, preference: ModelPreference) -> Self {
        self.preference = preference;
        self
    }
}

#[async_trait]
impl ModelResolver for CatalogResolver {
    async fn resolve_model(&self) -> String {
        match self.catalog.text_models().await {
            Ok(models) => {
                let model = self.preference.select(&models);
                debug!(model = %model, available = models.len(), "Resolved model");
                model
            }
            Err(e) => {
                warn!(error = %e, default = %self.preference.default, "Model listing failed, using default");
                self.preference.default.clone()
            }
        }
    }
}

#[async_trait]
impl ModelCatalog for Gemini {
    async fn text_models(&self) -> Result<Vec<String>, CompletionError> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .filter(|m| m.supports_generation())
            .map(|m| m.id().to_string())
            .collect())
    }
}

/// Completion service backed by the Gemini API.
pub struct GeminiService {
    client: Gemini,
    resolver: Arc<dyn ModelResolver>,
    max_output_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl GeminiService {
    /// Create a service that resolves its model from the account's model list.
    pub fn new(client: Gemini) -> Self {
        let resolver: Arc<dyn ModelResolver> =
            Arc::new(CatalogResolver::new(Arc::new(client.clone())));
        Self {
            client,
            resolver,
            max_output_tokens: None,
            temperature: None,
        }
    }

    /// Replace the model-selection strategy.
    pub fn with_resolver(mut self, resolver: Arc<dyn ModelResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl CompletionService for GeminiService {
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        let model = self.resolver.resolve_model().await;

        let mut request = Request::prompt(prompt).with_model(&model);
        if let Some(max) = self.max_output_tokens {
            request = request.with_max_output_tokens(max);
        }
        if let Some(temp) = self.temperature {
            request = request.with_temperature(temp);
        }

        let response = self.client.complete(request).await?;
        debug!(
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion finished"
        );

        let text = response.text();
        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text)
    }
}
