//! Retrieval fusion: lexical and semantic search merged into one ranked
//! result list.
//!
//! Scores from the two backends live on different scales, so both are
//! normalized into [0, 1] before they are compared: lexical scores by the
//! per-response maximum, vector distances through 1/(1+d). Backend
//! failures degrade the result set instead of failing the request.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use trace_core::error::AppError;

use crate::config::SearchConfig;
use crate::models::{truncate_chars, Corpus, Principal};
use crate::services::backends::{LexicalSearcher, VectorSearcher};
use crate::services::directory::Directory;

/// Longest excerpt carried in a match result.
pub const MAX_EXCERPT_LEN: usize = 500;
/// Excerpt prefix length used for cross-mode deduplication.
const DEDUP_PREFIX_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub document_id: String,
    pub document_name: String,
    pub corpus_name: String,
    pub score: f64,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

#[derive(Clone)]
pub struct SearchEngine {
    lexical: Arc<dyn LexicalSearcher>,
    vector: Arc<dyn VectorSearcher>,
    directory: Arc<dyn Directory>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        lexical: Arc<dyn LexicalSearcher>,
        vector: Arc<dyn VectorSearcher>,
        directory: Arc<dyn Directory>,
        config: SearchConfig,
    ) -> Self {
        Self {
            lexical,
            vector,
            directory,
            config,
        }
    }

    /// Run a trace query for `principal`. Results are scoped to the
    /// corpora the caller may see, sorted descending by score and capped
    /// at `top_k`.
    pub async fn trace(
        &self,
        principal: &Principal,
        text: &str,
        mode: MatchMode,
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<MatchResult>, AppError> {
        let corpora = self.visible_corpora(principal).await?;
        if corpora.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = match mode {
            MatchMode::Exact => self.exact_matches(&corpora, text, top_k, threshold).await,
            MatchMode::Semantic => {
                self.semantic_matches(&corpora, text, top_k, threshold)
                    .await
            }
            MatchMode::Hybrid => {
                let mut merged = self.exact_matches(&corpora, text, top_k, threshold).await;
                if merged.len() < top_k {
                    // Widen the candidate pool so dedup against exact
                    // hits still leaves enough to fill up.
                    let candidates = top_k + merged.len();
                    let semantic = self
                        .semantic_matches(&corpora, text, candidates, threshold)
                        .await;
                    let mut seen: std::collections::HashSet<(String, String)> = merged
                        .iter()
                        .map(|m| dedup_key(&m.document_id, &m.excerpt))
                        .collect();
                    for result in semantic {
                        if merged.len() >= top_k {
                            break;
                        }
                        if seen.insert(dedup_key(&result.document_id, &result.excerpt)) {
                            merged.push(result);
                        }
                    }
                }
                merged
            }
        };

        // Stable sort: equal scores keep discovery order, exact hits
        // ahead of semantic ones in hybrid mode.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }

    /// Corpora the caller may search: everything for the admin role,
    /// otherwise owned plus role-granted.
    pub async fn visible_corpora(&self, principal: &Principal) -> Result<Vec<Corpus>, AppError> {
        if principal.has_role(self.config.admin_role_id) {
            return self.directory.all_corpora().await;
        }
        let mut corpora = self.directory.corpora_owned_by(principal.user_id).await?;
        let granted = self
            .directory
            .corpora_granted_to_roles(&principal.roles)
            .await?;
        let mut seen: std::collections::HashSet<i64> = corpora.iter().map(|c| c.id).collect();
        for corpus in granted {
            if seen.insert(corpus.id) {
                corpora.push(corpus);
            }
        }
        Ok(corpora)
    }

    async fn exact_matches(
        &self,
        corpora: &[Corpus],
        query: &str,
        top_k: usize,
        threshold: f64,
    ) -> Vec<MatchResult> {
        let timeout = Duration::from_millis(self.config.backend_timeout_ms);
        let searches = corpora
            .iter()
            .filter_map(|c| c.index_name.as_deref().map(|index| (c, index)))
            .map(|(corpus, index)| async move {
                let outcome =
                    tokio::time::timeout(timeout, self.lexical.search(index, query, top_k)).await;
                (corpus, outcome)
            });

        let mut results = Vec::new();
        for (corpus, outcome) in join_all(searches).await {
            let hits = match outcome {
                Ok(Ok(hits)) => hits,
                Ok(Err(e)) => {
                    tracing::warn!(corpus = %corpus.name, error = %e, "lexical search failed");
                    continue;
                }
                Err(_) => {
                    tracing::warn!(corpus = %corpus.name, "lexical search timed out");
                    continue;
                }
            };

            // Relevance scores are only comparable within one response,
            // so the batch maximum is the normalization base.
            let max_score = hits.iter().map(|h| h.score).fold(f64::NEG_INFINITY, f64::max);
            for hit in hits {
                let score = if max_score > 0.0 {
                    round4(hit.score / max_score)
                } else {
                    0.0
                };
                if score < threshold {
                    continue;
                }
                results.push(self.to_result(corpus, hit.document_id, hit.document_name, score, &hit.text));
            }
        }
        results
    }

    async fn semantic_matches(
        &self,
        corpora: &[Corpus],
        query: &str,
        top_k: usize,
        threshold: f64,
    ) -> Vec<MatchResult> {
        let timeout = Duration::from_millis(self.config.backend_timeout_ms);
        let searches = corpora
            .iter()
            .filter_map(|c| {
                c.collection_name
                    .as_deref()
                    .map(|collection| (c, collection))
            })
            .map(|(corpus, collection)| async move {
                let outcome =
                    tokio::time::timeout(timeout, self.vector.search(collection, query, top_k))
                        .await;
                (corpus, outcome)
            });

        let mut results = Vec::new();
        for (corpus, outcome) in join_all(searches).await {
            let hits = match outcome {
                Ok(Ok(hits)) => hits,
                Ok(Err(e)) => {
                    tracing::warn!(corpus = %corpus.name, error = %e, "vector search failed");
                    continue;
                }
                Err(_) => {
                    tracing::warn!(corpus = %corpus.name, "vector search timed out");
                    continue;
                }
            };

            for hit in hits {
                let score = distance_to_similarity(hit.distance);
                if score < threshold {
                    continue;
                }
                results.push(self.to_result(corpus, hit.document_id, hit.document_name, score, &hit.text));
            }
        }
        results
    }

    fn to_result(
        &self,
        corpus: &Corpus,
        document_id: String,
        document_name: String,
        score: f64,
        text: &str,
    ) -> MatchResult {
        let excerpt = truncate_chars(&self.strip_wrapper(text), MAX_EXCERPT_LEN);
        MatchResult {
            document_id,
            document_name,
            corpus_name: corpus.name.clone(),
            score,
            excerpt,
            preview_url: None,
        }
    }

    /// Indexed chunks carry a title wrapper around the paragraph body;
    /// strip it so the excerpt reads as the source text.
    fn strip_wrapper(&self, text: &str) -> String {
        if !text.starts_with(&self.config.chunk_prefix_marker) {
            return text.to_string();
        }
        let Some(start) = text.find(&self.config.paragraph_start_marker) else {
            return text.to_string();
        };
        let body = &text[start + self.config.paragraph_start_marker.len()..];
        let body = match body.find(&self.config.paragraph_end_marker) {
            Some(end) => &body[..end],
            None => body,
        };
        body.to_string()
    }
}

fn dedup_key(document_id: &str, excerpt: &str) -> (String, String) {
    (
        document_id.to_string(),
        excerpt.chars().take(DEDUP_PREFIX_LEN).collect(),
    )
}

/// Map a vector distance to a similarity in [0, 1]. Negative distances
/// from an ill-behaved backend clamp to a perfect match.
pub fn distance_to_similarity(distance: f64) -> f64 {
    round4((1.0 / (1.0 + distance.max(0.0))).min(1.0))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
