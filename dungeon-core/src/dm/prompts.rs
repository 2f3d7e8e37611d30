//! Prompt builders for the DM.
//!
//! The layouts here are load-bearing: the model sees the journal, the recent
//! chat and the player's action in exactly this shape every turn.

/// Build the per-turn narration prompt.
pub fn build_turn_prompt(summary: &str, recent_history: &[String], action: &str) -> String {
    let recent_text = recent_history.join("\n");

    format!(
        "You are the Dungeon Master. \n\
         --- JOURNAL ---\n{summary}\n\
         --- RECENT CHAT ---\n{recent_text}\n\
         PLAYER: {action}\n"
    )
}

/// Build the prompt that folds evicted turns into the journal.
pub fn build_compaction_prompt(summary: &str, evicted: &str) -> String {
    format!("Summarize into journal: {summary} \n Add these events: {evicted}")
}

/// Build the prompt for the opening scene of a new adventure.
pub fn build_opening_prompt(genre: &str) -> String {
    format!(
        "You are a Dungeon Master for a {genre} game. \
         Describe the starting scene in 2 sentences. Address the player directly."
    )
}
