//! OpenSubtitles REST provider (credential-gated, token-authenticated).
//!
//! Auth flow: `POST /login` with username/password yields a token documented
//! as valid for 24 hours; we cache it for 23 so clock skew never hands out a
//! token the server already considers dead. Any 401/403 response drops the
//! cached token and the next call re-authenticates.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, warn};

use subfin_core::{ProviderError, SubtitleSearchResult};
use subfin_diaglog::DiagnosticLog;

use crate::cache;
use crate::provider::SubtitleProvider;

const DEFAULT_BASE_URL: &str = "https://api.opensubtitles.com/api/v1";

/// Cache the token one hour short of the documented 24-hour lifetime.
const TOKEN_TTL_HOURS: i64 = 23;

/// Candidates retained from a search, in the provider's own ranking order.
const MAX_RESULTS: usize = 5;

pub const PROVIDER_NAME: &str = "opensubtitles";

/// Credential snapshot read from the config store at construction time,
/// so `enabled` stays a pure function.
#[derive(Debug, Clone, Default)]
pub struct OpenSubtitlesCredentials {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
struct AuthToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

pub struct OpenSubtitlesProvider {
    base_url: String,
    credentials: OpenSubtitlesCredentials,
    cache_dir: PathBuf,
    client: reqwest::Client,
    // Serializes token refresh; two racing searches perform one login.
    token: tokio::sync::Mutex<Option<AuthToken>>,
    diag: Arc<DiagnosticLog>,
}

impl OpenSubtitlesProvider {
    pub fn new(
        credentials: OpenSubtitlesCredentials,
        cache_dir: PathBuf,
        diag: Arc<DiagnosticLog>,
    ) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, credentials, cache_dir, diag)
    }

    /// Point the provider at a different endpoint (tests).
    pub fn with_base_url(
        base_url: &str,
        credentials: OpenSubtitlesCredentials,
        cache_dir: PathBuf,
        diag: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            cache_dir,
            client: crate::http_client(),
            token: tokio::sync::Mutex::new(None),
            diag,
        }
    }

    /// Cached token if still valid, otherwise a fresh login. `None` when
    /// authentication fails; the cache is left untouched in that case.
    async fn auth_token(&self) -> Option<String> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.is_valid() {
                return Some(token.value.clone());
            }
            debug!(provider = PROVIDER_NAME, "cached token expired");
        }

        match self.login().await {
            Ok(token) => {
                let value = token.value.clone();
                *slot = Some(token);
                Some(value)
            }
            Err(e) => {
                warn!(provider = PROVIDER_NAME, error = %e, "login failed");
                self.diag
                    .error(PROVIDER_NAME, format!("authentication failed: {e}"));
                None
            }
        }
    }

    async fn login(&self) -> Result<AuthToken, ProviderError> {
        let (Some(username), Some(password)) = (
            self.credentials.username.as_deref(),
            self.credentials.password.as_deref(),
        ) else {
            return Err(ProviderError::Auth("username/password not configured".into()));
        };

        let mut req = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&serde_json::json!({ "username": username, "password": password }));
        if let Some(key) = &self.credentials.api_key {
            req = req.header("Api-Key", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("login rejected ({status})")));
        }
        if !status.is_success() {
            return Err(ProviderError::status(status.as_u16(), "login failed"));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("login response: {e}")))?;
        let value = body["token"]
            .as_str()
            .ok_or_else(|| ProviderError::Malformed("login response missing token".into()))?
            .to_string();

        Ok(AuthToken {
            value,
            expires_at: Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
        })
    }

    /// Discard the cached token so the next call re-authenticates. Called
    /// internally on 401/403-class responses; also the right thing to do
    /// when credentials change under a live provider instance.
    pub async fn drop_cached_token(&self) {
        self.token.lock().await.take();
    }

    async fn search_inner(
        &self,
        token: &str,
        query: &str,
        imdb_id: Option<&str>,
        language: &str,
    ) -> Result<Vec<SubtitleSearchResult>, ProviderError> {
        let encoded_query = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        let mut url = format!(
            "{}/subtitles?query={}&languages={}",
            self.base_url,
            encoded_query,
            language.to_ascii_lowercase()
        );
        if let Some(id) = imdb_id {
            // API wants the bare numeric part, tolerate a "tt" prefix.
            let id = id.trim_start_matches("tt");
            url.push_str(&format!("&imdb_id={id}"));
        }
        debug!(provider = PROVIDER_NAME, url = %url, "search request");

        let mut req = self.client.get(&url).bearer_auth(token);
        if let Some(key) = &self.credentials.api_key {
            req = req.header("Api-Key", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::status(status.as_u16(), "search rejected"));
        }
        if !status.is_success() {
            return Err(ProviderError::status(status.as_u16(), "search failed"));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("search response: {e}")))?;
        let hits = body["data"]
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("search response missing data array".into()))?;

        // Keep the provider's own ranking; no local re-ordering.
        let results = hits
            .iter()
            .filter_map(|hit| parse_hit(hit))
            .take(MAX_RESULTS)
            .collect();
        Ok(results)
    }

    async fn download_inner(
        &self,
        token: &str,
        result: &SubtitleSearchResult,
    ) -> Result<PathBuf, ProviderError> {
        // Trade the file id for a signed one-time link.
        let file_id: u64 = result.download_url.parse().map_err(|_| {
            ProviderError::Malformed(format!("unresolvable file id: {}", result.download_url))
        })?;
        let mut req = self
            .client
            .post(format!("{}/download", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "file_id": file_id }));
        if let Some(key) = &self.credentials.api_key {
            req = req.header("Api-Key", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::status(status.as_u16(), "download rejected"));
        }
        if !status.is_success() {
            return Err(ProviderError::status(status.as_u16(), "download link request failed"));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("download response: {e}")))?;
        let link = body["link"]
            .as_str()
            .ok_or_else(|| ProviderError::Malformed("download response missing link".into()))?
            .to_string();

        // The signed link needs no auth.
        let resp = self
            .client
            .get(&link)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::status(resp.status().as_u16(), "payload fetch failed"));
        }

        let gzipped = resp
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("gzip"));
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let data = if gzipped {
            cache::gunzip(&bytes)
                .map_err(|e| ProviderError::Malformed(format!("gzip decode: {e}")))?
        } else {
            bytes.to_vec()
        };

        let ext = cache::infer_extension(content_type.as_deref(), &link);
        cache::write_subtitle(&self.cache_dir, &result.language, ext, &data)
    }
}

fn parse_hit(hit: &serde_json::Value) -> Option<SubtitleSearchResult> {
    let attrs = &hit["attributes"];
    // A hit without a resolvable file id cannot be downloaded; drop it.
    let file_id = attrs["files"]
        .as_array()
        .and_then(|files| files.first())
        .and_then(|f| f["file_id"].as_u64())?;

    let name = attrs["release"]
        .as_str()
        .or_else(|| {
            attrs["feature_details"]
                .as_object()
                .and_then(|d| d["movie_name"].as_str())
        })
        .unwrap_or("Unknown release")
        .to_string();

    Some(SubtitleSearchResult {
        id: file_id.to_string(),
        name,
        language: attrs["language"].as_str().unwrap_or_default().to_string(),
        downloads: attrs["download_count"].as_u64().unwrap_or(0),
        rating: attrs["ratings"].as_f64().unwrap_or(0.0),
        download_url: file_id.to_string(),
        provider: PROVIDER_NAME.to_string(),
    })
}

#[async_trait::async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn enabled(&self) -> bool {
        self.credentials.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.credentials.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    async fn search(
        &self,
        query: &str,
        imdb_id: Option<&str>,
        language: &str,
    ) -> Vec<SubtitleSearchResult> {
        let Some(token) = self.auth_token().await else {
            // auth_token already logged the failure
            return Vec::new();
        };

        match self.search_inner(&token, query, imdb_id, language).await {
            Ok(results) => {
                self.diag.info(
                    PROVIDER_NAME,
                    format!("search \"{query}\" returned {} result(s)", results.len()),
                );
                results
            }
            Err(e) => {
                if e.is_auth() {
                    self.drop_cached_token().await;
                }
                warn!(provider = PROVIDER_NAME, error = %e, "search failed");
                self.diag
                    .error_with_trace(PROVIDER_NAME, "search failed", e.to_string());
                Vec::new()
            }
        }
    }

    async fn download(&self, result: &SubtitleSearchResult) -> Option<PathBuf> {
        let token = self.auth_token().await?;

        match self.download_inner(&token, result).await {
            Ok(path) => {
                self.diag.info(
                    PROVIDER_NAME,
                    format!("downloaded \"{}\" to {}", result.name, path.display()),
                );
                Some(path)
            }
            Err(e) => {
                if e.is_auth() {
                    self.drop_cached_token().await;
                }
                warn!(provider = PROVIDER_NAME, error = %e, "download failed");
                self.diag
                    .error_with_trace(PROVIDER_NAME, "download failed", e.to_string());
                None
            }
        }
    }
}
