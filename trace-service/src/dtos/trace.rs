use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::search::{MatchMode, MatchResult};

fn default_match_mode() -> MatchMode {
    MatchMode::Hybrid
}

fn default_top_k() -> usize {
    10
}

fn default_threshold() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Validate)]
pub struct TextTraceRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default = "default_match_mode")]
    pub match_mode: MatchMode,
    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 100))]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct TraceResponse {
    pub matches: Vec<MatchResult>,
    pub total: usize,
}
