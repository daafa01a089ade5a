//! Preview capabilities: one-time tokens that grant a single rendered
//! view of one document, plus the HTML renderer itself.

use std::sync::Arc;

use trace_core::error::AppError;

use crate::config::PreviewConfig;
use crate::models::PreviewCapability;
use crate::services::cache::ExpiringStore;
use crate::utils::random_urlsafe_token;

const KEY_PREFIX: &str = "preview_token:";

#[derive(Clone)]
pub struct PreviewService {
    store: Arc<dyn ExpiringStore>,
    config: PreviewConfig,
}

impl PreviewService {
    pub fn new(store: Arc<dyn ExpiringStore>, config: PreviewConfig) -> Self {
        Self { store, config }
    }

    /// Mint a capability token for one document view. The token is the
    /// only handle; nothing else references the stored value.
    pub async fn issue(
        &self,
        document_id: i64,
        user_id: i64,
        highlight_text: &str,
    ) -> Result<String, AppError> {
        let capability = PreviewCapability::new(document_id, user_id, highlight_text);
        let value = serde_json::to_string(&capability)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("capability encode: {}", e)))?;
        let token = random_urlsafe_token(32);
        self.store
            .set(
                &format!("{}{}", KEY_PREFIX, token),
                &value,
                self.config.token_ttl_seconds,
            )
            .await?;
        Ok(token)
    }

    /// Consume a token. `None` covers expired, already-used and
    /// never-issued alike; the caller cannot tell them apart.
    pub async fn redeem(&self, token: &str) -> Result<Option<PreviewCapability>, AppError> {
        let Some(value) = self.store.take(&format!("{}{}", KEY_PREFIX, token)).await? else {
            return Ok(None);
        };
        let capability = serde_json::from_str(&value)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("capability decode: {}", e)))?;
        Ok(Some(capability))
    }

    pub fn preview_url(&self, document_id: i64, token: &str) -> String {
        format!(
            "{}/{}?token={}",
            self.config.url_prefix.trim_end_matches('/'),
            document_id,
            urlencoding::encode(token)
        )
    }
}

/// Render the preview page. Every dynamic string is escaped; the first
/// verbatim occurrence of the highlight is wrapped in a mark element the
/// page scrolls to on load. When the highlight does not occur, the whole
/// content block is marked instead.
pub fn render_preview_html(document_name: &str, content: &str, highlight: &str) -> String {
    let body = if !highlight.is_empty() {
        match content.find(highlight) {
            Some(pos) => format!(
                "{}<mark id=\"highlight-match\" class=\"highlight\">{}</mark>{}",
                escape_html(&content[..pos]),
                escape_html(highlight),
                escape_html(&content[pos + highlight.len()..])
            ),
            None => format!(
                "<mark id=\"highlight-match\" class=\"highlight\">{}</mark>",
                escape_html(content)
            ),
        }
    } else {
        format!(
            "<mark id=\"highlight-match\" class=\"highlight\">{}</mark>",
            escape_html(content)
        )
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem auto; max-width: 48rem; line-height: 1.6; }}
pre {{ white-space: pre-wrap; word-break: break-word; }}
.highlight {{ background: #fff3b0; }}
</style>
</head>
<body>
<h1>{title}</h1>
<pre>{body}</pre>
<script>
var el = document.getElementById('highlight-match');
if (el) {{ el.scrollIntoView({{ block: 'center' }}); }}
</script>
</body>
</html>
"#,
        title = escape_html(document_name),
        body = body
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
