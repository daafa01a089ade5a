//! Application state and router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::TraceConfig;
use crate::handlers;
use crate::middleware::{auth_middleware, session_middleware};
use crate::services::backends::{ContentStore, LexicalSearcher, VectorSearcher};
use crate::services::cache::ExpiringStore;
use crate::services::directory::Directory;
use crate::services::oauth::OauthEngine;
use crate::services::preview::PreviewService;
use crate::services::search::SearchEngine;
use crate::services::store::CredentialStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TraceConfig>,
    pub oauth: OauthEngine,
    pub search: SearchEngine,
    pub preview: PreviewService,
    pub store: Arc<dyn CredentialStore>,
    pub cache: Arc<dyn ExpiringStore>,
    pub directory: Arc<dyn Directory>,
    pub content: Arc<dyn ContentStore>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<TraceConfig>,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn ExpiringStore>,
        directory: Arc<dyn Directory>,
        lexical: Arc<dyn LexicalSearcher>,
        vector: Arc<dyn VectorSearcher>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        let oauth = OauthEngine::new(
            store.clone(),
            config.oauth.code_ttl_seconds,
            config.oauth.access_token_ttl_seconds,
        );
        let search = SearchEngine::new(lexical, vector, directory.clone(), config.search.clone());
        let preview = PreviewService::new(cache.clone(), config.preview.clone());
        Self {
            config,
            oauth,
            search,
            preview,
            store,
            cache,
            directory,
            content,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Session-authenticated management surface
    let management = Router::new()
        .route(
            "/oauth/applications",
            post(handlers::applications::create_application)
                .get(handlers::applications::list_applications),
        )
        .route(
            "/oauth/applications/:app_id",
            delete(handlers::applications::delete_application),
        )
        .route("/oauth/authorize", get(handlers::oauth::authorize))
        .layer(from_fn_with_state(state.clone(), session_middleware));

    // Bearer-authenticated open API
    let open = Router::new()
        .route("/open/text-trace", post(handlers::trace::text_trace))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/oauth/token", post(handlers::oauth::token))
        .route(
            "/open/document/preview/:document_id",
            get(handlers::preview::preview_document),
        )
        .merge(management)
        .merge(open)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &TraceConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-session-id"),
        ])
}

/// Background sweep for expired authorization codes. Codes are already
/// unusable once expired; the sweep just keeps the table small.
pub fn spawn_code_sweeper(state: &AppState) -> tokio::task::JoinHandle<()> {
    let oauth = state.oauth.clone();
    let interval = Duration::from_secs(state.config.oauth.code_sweep_interval_seconds);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match oauth.sweep_expired_codes().await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(removed, "expired authorization codes swept");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "authorization code sweep failed");
                }
            }
        }
    })
}
