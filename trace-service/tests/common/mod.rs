#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use trace_service::config::{
    DatabaseConfig, Environment, OAuthConfig, PreviewConfig, RedisConfig, SearchConfig,
    SecurityConfig, StorageConfig, TraceConfig,
};
use trace_service::models::{Corpus, Document, UserRecord};
use trace_service::services::backends::{
    StaticContentStore, StaticLexicalSearcher, StaticVectorSearcher,
};
use trace_service::services::cache::{ExpiringStore, MemoryExpiringStore};
use trace_service::services::directory::MemoryDirectory;
use trace_service::services::store::MemoryCredentialStore;
use trace_service::{build_router, AppState};

pub const OWNER_ID: i64 = 7;
pub const OWNER_NAME: &str = "ada";
pub const SESSION_ID: &str = "sess-test-1";

pub fn test_config() -> TraceConfig {
    TraceConfig {
        common: trace_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "trace-service".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "warn".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
        },
        oauth: OAuthConfig {
            code_ttl_seconds: 300,
            access_token_ttl_seconds: 7200,
            code_sweep_interval_seconds: 60,
        },
        search: SearchConfig {
            admin_role_id: 1,
            lexical_url: "http://lexical.test".to_string(),
            vector_url: "http://vector.test".to_string(),
            backend_timeout_ms: 5000,
            chunk_prefix_marker: "{<file_title>".to_string(),
            paragraph_start_marker: "<paragraph_content>".to_string(),
            paragraph_end_marker: "</paragraph_content>".to_string(),
        },
        storage: StorageConfig {
            url: "http://storage.test".to_string(),
        },
        preview: PreviewConfig {
            token_ttl_seconds: 1800,
            url_prefix: "/open/document/preview".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

/// Builder over the in-memory backends. Seed the public fields, then
/// `build()` for a router wired exactly like production.
pub struct TestAppBuilder {
    pub directory: MemoryDirectory,
    pub lexical: StaticLexicalSearcher,
    pub vector: StaticVectorSearcher,
    pub content: StaticContentStore,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        let mut directory = MemoryDirectory::new();
        directory.users.push(UserRecord {
            user_id: OWNER_ID,
            user_name: OWNER_NAME.to_string(),
        });
        Self {
            directory,
            lexical: StaticLexicalSearcher::default(),
            vector: StaticVectorSearcher::default(),
            content: StaticContentStore::default(),
        }
    }

    pub fn with_corpus(mut self, corpus: Corpus) -> Self {
        self.directory.corpora.push(corpus);
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.directory.documents.push(document);
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(MemoryCredentialStore::new());
        let cache = Arc::new(MemoryExpiringStore::new());
        let state = AppState::new(
            Arc::new(test_config()),
            store.clone(),
            cache.clone(),
            Arc::new(self.directory),
            Arc::new(self.lexical),
            Arc::new(self.vector),
            Arc::new(self.content),
        );
        TestApp {
            router: build_router(state),
            store,
            cache,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryCredentialStore>,
    pub cache: Arc<MemoryExpiringStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        TestAppBuilder::new().build()
    }

    /// Register a platform session resolving to `user_id`.
    pub async fn seed_session(&self, session_id: &str, user_id: i64) {
        self.cache
            .set(&format!("session:{}", session_id), &user_id.to_string(), 3600)
            .await
            .unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, path: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get_with_session(&self, path: &str, session_id: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(path)
                .header("x-session-id", session_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json_with_session(
        &self,
        path: &str,
        session_id: &str,
        body: Value,
    ) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("x-session-id", session_id)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json_with_bearer(
        &self,
        path: &str,
        token: &str,
        body: Value,
    ) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete_with_session(&self, path: &str, session_id: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(path)
                .header("x-session-id", session_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Full handshake: register an application for the seeded owner,
    /// authorize, exchange the code. Returns (application json, token json).
    pub async fn issue_bearer(&self, user_id: i64) -> (Value, Value) {
        self.seed_session(SESSION_ID, user_id).await;

        let response = self
            .post_json_with_session(
                "/oauth/applications",
                SESSION_ID,
                serde_json::json!({
                    "name": "reader",
                    "redirect_uri": "https://a.test/cb",
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
        let app = body_json(response).await;

        let authorize_path = format!(
            "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}",
            app["client_id"].as_str().unwrap(),
            urlencoding::encode("https://a.test/cb"),
        );
        let response = self.get_with_session(&authorize_path, SESSION_ID).await;
        assert_eq!(response.status(), 302);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let code = code_from_location(&location);

        let response = self
            .post_json(
                "/oauth/token",
                serde_json::json!({
                    "grant_type": "authorization_code",
                    "client_id": app["client_id"],
                    "client_secret": app["client_secret"],
                    "code": code,
                    "redirect_uri": "https://a.test/cb",
                }),
            )
            .await;
        assert_eq!(response.status(), 200);
        let token = body_json(response).await;
        (app, token)
    }
}

pub fn code_from_location(location: &str) -> String {
    let (_, query) = location.split_once('?').expect("redirect without query");
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("code="))
        .map(|code| urlencoding::decode(code).unwrap().into_owned())
        .expect("redirect without code")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
