//! Prompt-context rendering
//!
//! Pure formatting over already-retrieved hits and turns. Semantic and
//! recency blocks are not deduplicated against each other. The recency
//! header always carries a leading newline, even when it opens the context.

use crate::storage::{EntryKind, ScoredEntry, Turn};

pub const NO_CONTEXT: &str = "No relevant context found.";
pub const SEMANTIC_HEADER: &str = "=== Relevant Past Interactions ===";
pub const RECENT_HEADER: &str = "=== Recent Conversation History ===";

/// First `max_chars` characters of `text`, no ellipsis
pub fn snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Join the semantic block and the recency block into one string
pub fn render_context(hits: &[ScoredEntry], recent: &[Turn], snippet_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !hits.is_empty() {
        lines.push(SEMANTIC_HEADER.to_string());
        for hit in hits.iter().filter(|h| h.entry.kind == EntryKind::Conversation) {
            lines.push(format!("[Similarity: {:.2}]", hit.similarity));
            lines.push(format!("Time: {}", hit.entry.timestamp.to_rfc3339()));
        }
    }

    if !recent.is_empty() {
        lines.push(format!("\n{RECENT_HEADER}"));
        for turn in recent {
            lines.push(format!("User: {}", snippet(&turn.user_text, snippet_chars)));
            lines.push(format!("Agent: {}", snippet(&turn.agent_text, snippet_chars)));
        }
    }

    if lines.is_empty() {
        return NO_CONTEXT.to_string();
    }
    lines.join("\n")
}
