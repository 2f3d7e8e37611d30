//! Folding evicted turns into the journal.
//!
//! Compaction is best effort. When the summarizer fails the evicted lines are
//! simply gone: the journal keeps its previous text and play continues.

use super::memory::DmMemory;
use super::prompts::build_compaction_prompt;
use crate::provider::CompletionService;
use tracing::{debug, warn};

/// What happened to an evicted pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// The journal was rewritten to include the evicted turns.
    Compacted,
    /// The journal was left untouched and the evicted turns were dropped.
    Failed { reason: String },
}

impl CompactionOutcome {
    pub fn is_compacted(&self) -> bool {
        matches!(self, CompactionOutcome::Compacted)
    }
}

/// Rewrite the journal in `memory` to absorb `evicted`.
pub async fn compact(
    summarizer: &dyn CompletionService,
    memory: &mut DmMemory,
    evicted: &str,
) -> CompactionOutcome {
    let prompt = build_compaction_prompt(memory.summary(), evicted);

    match summarizer.generate(&prompt).await {
        Ok(text) if !text.trim().is_empty() => {
            memory.set_summary(text.trim());
            debug!(summary_len = memory.summary().len(), "Journal compacted");
            CompactionOutcome::Compacted
        }
        Ok(_) => {
            warn!("Summarizer returned nothing, journal left unchanged");
            CompactionOutcome::Failed {
                reason: "empty summary".to_string(),
            }
        }
        Err(e) => {
            warn!(error = %e, "Compaction failed, journal left unchanged");
            CompactionOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
