use serde::Deserialize;
use std::env;
use trace_core::config as core_config;
use trace_core::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct TraceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub oauth: OAuthConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
    pub preview: PreviewConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Authorization code lifetime. Codes are single-use regardless.
    pub code_ttl_seconds: i64,
    /// Access token lifetime; refresh rotation mints a fresh pair.
    pub access_token_ttl_seconds: i64,
    /// Interval of the background sweep deleting expired codes.
    pub code_sweep_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Role that sees every corpus.
    pub admin_role_id: i64,
    pub lexical_url: String,
    pub vector_url: String,
    /// Upper bound for any single backend call.
    pub backend_timeout_ms: u64,
    /// Marker strings of the indexing pipeline's title wrapper. These are
    /// a content convention of the indexer, so they are configuration.
    pub chunk_prefix_marker: String,
    pub paragraph_start_marker: String,
    pub paragraph_end_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the object store serving extracted document text.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    pub token_ttl_seconds: u64,
    /// Path prefix used when building preview URLs for search results.
    pub url_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl TraceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = TraceConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("trace-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            redis: RedisConfig {
                url: get_env("REDIS_URL", None, is_prod)?,
            },
            oauth: OAuthConfig {
                code_ttl_seconds: parse_env("OAUTH_CODE_TTL_SECONDS", "300", is_prod)?,
                access_token_ttl_seconds: parse_env("OAUTH_ACCESS_TOKEN_TTL_SECONDS", "7200", is_prod)?,
                code_sweep_interval_seconds: parse_env("OAUTH_CODE_SWEEP_INTERVAL_SECONDS", "60", is_prod)?,
            },
            search: SearchConfig {
                admin_role_id: parse_env("SEARCH_ADMIN_ROLE_ID", "1", is_prod)?,
                lexical_url: get_env("SEARCH_LEXICAL_URL", Some("http://localhost:9200"), is_prod)?,
                vector_url: get_env("SEARCH_VECTOR_URL", Some("http://localhost:6333"), is_prod)?,
                backend_timeout_ms: parse_env("SEARCH_BACKEND_TIMEOUT_MS", "5000", is_prod)?,
                chunk_prefix_marker: get_env("SEARCH_CHUNK_PREFIX_MARKER", Some("{<file_title>"), is_prod)?,
                paragraph_start_marker: get_env(
                    "SEARCH_PARAGRAPH_START_MARKER",
                    Some("<paragraph_content>"),
                    is_prod,
                )?,
                paragraph_end_marker: get_env(
                    "SEARCH_PARAGRAPH_END_MARKER",
                    Some("</paragraph_content>"),
                    is_prod,
                )?,
            },
            storage: StorageConfig {
                url: get_env("STORAGE_URL", Some("http://localhost:9000"), is_prod)?,
            },
            preview: PreviewConfig {
                token_ttl_seconds: parse_env("PREVIEW_TOKEN_TTL_SECONDS", "1800", is_prod)?,
                url_prefix: get_env("PREVIEW_URL_PREFIX", Some("/open/document/preview"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.oauth.code_ttl_seconds <= 0 || self.oauth.access_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OAuth lifetimes must be positive"
            )));
        }

        if self.search.backend_timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SEARCH_BACKEND_TIMEOUT_MS must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("invalid value for {}: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
