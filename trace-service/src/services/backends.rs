//! Search backend clients.
//!
//! The fusion engine only knows the two traits; the HTTP types speak to
//! an Elasticsearch cluster and a REST nearest-neighbor service. The
//! static variants back the unit and integration tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use trace_core::error::AppError;

/// One lexical hit with its raw relevance score.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub document_id: String,
    pub document_name: String,
    pub score: f64,
    pub text: String,
}

/// One nearest-neighbor hit with its raw distance.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub document_id: String,
    pub document_name: String,
    pub distance: f64,
    pub text: String,
}

#[async_trait]
pub trait LexicalSearcher: Send + Sync {
    async fn search(
        &self,
        index_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<LexicalHit>, AppError>;
}

#[async_trait]
pub trait VectorSearcher: Send + Sync {
    async fn search(
        &self,
        collection_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError>;
}

/// Elasticsearch `_search` client. A 70% minimum-should-match keeps short
/// queries from matching on stray tokens.
#[derive(Clone)]
pub struct HttpLexicalSearcher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct EsResponse {
    hits: EsHits,
}

#[derive(Deserialize)]
struct EsHits {
    hits: Vec<EsHit>,
}

#[derive(Deserialize)]
struct EsHit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: EsSource,
}

#[derive(Deserialize)]
struct EsSource {
    document_id: String,
    document_name: String,
    #[serde(default)]
    content: String,
}

impl HttpLexicalSearcher {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LexicalSearcher for HttpLexicalSearcher {
    async fn search(
        &self,
        index_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<LexicalHit>, AppError> {
        let url = format!("{}/{}/_search", self.base_url, index_name);
        let body = json!({
            "size": top_k,
            "query": {
                "match": {
                    "content": {
                        "query": query,
                        "minimum_should_match": "70%",
                    }
                }
            },
            "_source": ["document_id", "document_name", "content"],
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("lexical backend: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("lexical backend: {}", e)))?;

        let parsed: EsResponse = response
            .json()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("lexical response: {}", e)))?;

        Ok(parsed
            .hits
            .hits
            .into_iter()
            .map(|h| LexicalHit {
                document_id: h.source.document_id,
                document_name: h.source.document_name,
                score: h.score.unwrap_or(0.0),
                text: h.source.content,
            })
            .collect())
    }
}

/// REST nearest-neighbor client. The embedding step lives behind the
/// backend; this side only ships text and a candidate limit.
#[derive(Clone)]
pub struct HttpVectorSearcher {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct NnResponse {
    results: Vec<NnHit>,
}

#[derive(Deserialize)]
struct NnHit {
    document_id: String,
    document_name: String,
    distance: f64,
    #[serde(default)]
    text: String,
}

impl HttpVectorSearcher {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VectorSearcher for HttpVectorSearcher {
    async fn search(
        &self,
        collection_name: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        let url = format!("{}/collections/{}/search", self.base_url, collection_name);
        let body = json!({ "query": query, "limit": top_k });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("vector backend: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("vector backend: {}", e)))?;

        let parsed: NnResponse = response
            .json()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("vector response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|h| VectorHit {
                document_id: h.document_id,
                document_name: h.document_name,
                distance: h.distance,
                text: h.text,
            })
            .collect())
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the extracted plain text of a stored object. `None` when the
    /// object does not exist.
    async fn fetch_text(&self, object_name: &str) -> Result<Option<String>, AppError>;
}

/// Object store client reading extracted text over HTTP.
#[derive(Clone)]
pub struct HttpContentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentStore {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn fetch_text(&self, object_name: &str) -> Result<Option<String>, AppError> {
        let url = format!("{}/{}", self.base_url, object_name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("object store: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("object store: {}", e)))?;
        let text = response
            .text()
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("object store: {}", e)))?;
        Ok(Some(text))
    }
}

/// Canned object store for tests.
#[derive(Default)]
pub struct StaticContentStore {
    objects: std::collections::HashMap<String, String>,
}

impl StaticContentStore {
    pub fn add_object(&mut self, object_name: &str, text: &str) {
        self.objects
            .insert(object_name.to_string(), text.to_string());
    }
}

#[async_trait]
impl ContentStore for StaticContentStore {
    async fn fetch_text(&self, object_name: &str) -> Result<Option<String>, AppError> {
        Ok(self.objects.get(object_name).cloned())
    }
}

/// Canned lexical backend for tests.
#[derive(Default)]
pub struct StaticLexicalSearcher {
    hits: std::collections::HashMap<String, Vec<LexicalHit>>,
    failing: std::collections::HashSet<String>,
}

impl StaticLexicalSearcher {
    pub fn add_hit(
        &mut self,
        index_name: &str,
        document_id: &str,
        document_name: &str,
        score: f64,
        text: &str,
    ) {
        self.hits
            .entry(index_name.to_string())
            .or_default()
            .push(LexicalHit {
                document_id: document_id.to_string(),
                document_name: document_name.to_string(),
                score,
                text: text.to_string(),
            });
    }

    /// Make every query against this index fail.
    pub fn fail_index(&mut self, index_name: &str) {
        self.failing.insert(index_name.to_string());
    }
}

#[async_trait]
impl LexicalSearcher for StaticLexicalSearcher {
    async fn search(
        &self,
        index_name: &str,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<LexicalHit>, AppError> {
        if self.failing.contains(index_name) {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "index {} unavailable",
                index_name
            )));
        }
        let mut hits = self.hits.get(index_name).cloned().unwrap_or_default();
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Canned nearest-neighbor backend for tests.
#[derive(Default)]
pub struct StaticVectorSearcher {
    hits: std::collections::HashMap<String, Vec<VectorHit>>,
    failing: std::collections::HashSet<String>,
}

impl StaticVectorSearcher {
    pub fn add_hit(
        &mut self,
        collection_name: &str,
        document_id: &str,
        document_name: &str,
        distance: f64,
        text: &str,
    ) {
        self.hits
            .entry(collection_name.to_string())
            .or_default()
            .push(VectorHit {
                document_id: document_id.to_string(),
                document_name: document_name.to_string(),
                distance,
                text: text.to_string(),
            });
    }

    pub fn fail_collection(&mut self, collection_name: &str) {
        self.failing.insert(collection_name.to_string());
    }
}

#[async_trait]
impl VectorSearcher for StaticVectorSearcher {
    async fn search(
        &self,
        collection_name: &str,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<VectorHit>, AppError> {
        if self.failing.contains(collection_name) {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "collection {} unavailable",
                collection_name
            )));
        }
        let mut hits = self.hits.get(collection_name).cloned().unwrap_or_default();
        hits.truncate(top_k);
        Ok(hits)
    }
}
