use serde::{Deserialize, Serialize};

/// Highlight text carried by a capability is bounded to keep the cache
/// value small; longer excerpts are truncated at issue time.
pub const MAX_HIGHLIGHT_LEN: usize = 2000;

/// One-time, narrowly-scoped right to view a highlighted excerpt of one
/// document. Lives only in the expiring store, consumed on first read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewCapability {
    pub document_id: i64,
    pub user_id: i64,
    pub highlight_text: String,
}

impl PreviewCapability {
    pub fn new(document_id: i64, user_id: i64, highlight_text: &str) -> Self {
        Self {
            document_id,
            user_id,
            highlight_text: truncate_chars(highlight_text, MAX_HIGHLIGHT_LEN),
        }
    }
}

/// Truncate on a character boundary, never mid-codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
