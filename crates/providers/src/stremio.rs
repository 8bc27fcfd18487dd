//! Stremio-protocol addon provider (manifest-discoverable subtitle search).
//!
//! One instance per configured addon URL. Capability discovery goes through
//! `GET {base}/manifest.json`; subtitle queries use
//! `{base}/subtitles/movie/{imdbId}.json` when an id is available, else the
//! conventional `{base}/subtitles/search/{query}.json` text endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::{debug, warn};

use subfin_core::{ProviderError, SubtitleSearchResult};
use subfin_diaglog::DiagnosticLog;

use crate::cache;
use crate::provider::SubtitleProvider;

/// Addon manifest, reduced to the part we check.
#[derive(Debug, Deserialize)]
struct AddonManifest {
    #[serde(default)]
    resources: Vec<ResourceDescriptor>,
}

/// Manifest `resources` entries come as bare strings or full objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResourceDescriptor {
    Short(String),
    Full { name: String },
}

impl ResourceDescriptor {
    /// Equal to or prefixed by `subtitles` counts as subtitle support.
    fn is_subtitles(&self) -> bool {
        match self {
            Self::Short(s) => s.starts_with("subtitles"),
            Self::Full { name } => name == "subtitles",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubtitlesResponse {
    #[serde(default)]
    subtitles: Vec<AddonSubtitle>,
}

#[derive(Debug, Deserialize)]
struct AddonSubtitle {
    #[serde(default)]
    id: Option<String>,
    url: String,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

pub struct StremioAddonProvider {
    base_url: String,
    name: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
    diag: Arc<DiagnosticLog>,
}

impl StremioAddonProvider {
    pub fn new(base_url: &str, cache_dir: PathBuf, diag: Arc<DiagnosticLog>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let name = derive_name(&base_url);
        Self {
            base_url,
            name,
            cache_dir,
            client: crate::http_client(),
            diag,
        }
    }

    /// Fetch the manifest and confirm the addon declares subtitle support.
    async fn verify(&self) -> Result<(), ProviderError> {
        let url = format!("{}/manifest.json", self.base_url);
        debug!(provider = %self.name, url = %url, "manifest probe");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::status(
                resp.status().as_u16(),
                "manifest fetch failed",
            ));
        }

        let manifest: AddonManifest = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("manifest: {e}")))?;

        if manifest.resources.iter().any(|r| r.is_subtitles()) {
            Ok(())
        } else {
            Err(ProviderError::Malformed(
                "addon does not declare a subtitles resource".into(),
            ))
        }
    }

    async fn search_inner(
        &self,
        query: &str,
        imdb_id: Option<&str>,
        language: &str,
    ) -> Result<Vec<SubtitleSearchResult>, ProviderError> {
        self.verify().await?;

        let url = match imdb_id {
            Some(id) => format!("{}/subtitles/movie/{id}.json", self.base_url),
            None => format!(
                "{}/subtitles/search/{}.json",
                self.base_url,
                utf8_percent_encode(query, NON_ALPHANUMERIC)
            ),
        };
        debug!(provider = %self.name, url = %url, "search request");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::status(resp.status().as_u16(), "search failed"));
        }

        let body: SubtitlesResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("subtitles response: {e}")))?;

        let results = body
            .subtitles
            .into_iter()
            .enumerate()
            .filter(|(_, sub)| language_matches(language, sub.lang.as_deref()))
            .map(|(idx, sub)| {
                let lang = sub.lang.unwrap_or_default();
                let name = sub
                    .label
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| format!("Subtitle {} ({lang})", idx + 1));
                SubtitleSearchResult {
                    id: sub.id.unwrap_or_else(|| idx.to_string()),
                    name,
                    language: lang,
                    downloads: 0,
                    rating: 0.0,
                    download_url: sub.url,
                    provider: self.name.clone(),
                }
            })
            .collect();
        Ok(results)
    }

    async fn download_inner(
        &self,
        result: &SubtitleSearchResult,
    ) -> Result<PathBuf, ProviderError> {
        let resp = self
            .client
            .get(&result.download_url)
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::status(
                resp.status().as_u16(),
                "subtitle fetch failed",
            ));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        let ext = cache::infer_extension(content_type.as_deref(), &result.download_url);
        cache::write_subtitle(&self.cache_dir, &result.language, ext, &bytes)
    }
}

/// Label derived from the configured URL's host, so multiple addon instances
/// stay distinguishable in logs and UI.
fn derive_name(base_url: &str) -> String {
    match url::Url::parse(base_url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("addon:{host}"),
            None => format!("addon:{base_url}"),
        },
        Err(_) => format!("addon:{base_url}"),
    }
}

/// Case-insensitive language filter, applied only when both the requested
/// language and the entry's language are non-empty.
fn language_matches(requested: &str, entry: Option<&str>) -> bool {
    match entry {
        Some(lang) if !lang.is_empty() && !requested.is_empty() => {
            lang.eq_ignore_ascii_case(requested)
        }
        _ => true,
    }
}

#[async_trait::async_trait]
impl SubtitleProvider for StremioAddonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn search(
        &self,
        query: &str,
        imdb_id: Option<&str>,
        language: &str,
    ) -> Vec<SubtitleSearchResult> {
        match self.search_inner(query, imdb_id, language).await {
            Ok(results) => {
                self.diag.info(
                    &self.name,
                    format!("search \"{query}\" returned {} result(s)", results.len()),
                );
                results
            }
            Err(e) => {
                warn!(provider = %self.name, error = %e, "search failed");
                self.diag
                    .error_with_trace(&self.name, "search failed", e.to_string());
                Vec::new()
            }
        }
    }

    async fn download(&self, result: &SubtitleSearchResult) -> Option<PathBuf> {
        match self.download_inner(result).await {
            Ok(path) => {
                self.diag.info(
                    &self.name,
                    format!("downloaded \"{}\" to {}", result.name, path.display()),
                );
                Some(path)
            }
            Err(e) => {
                warn!(provider = %self.name, error = %e, "download failed");
                self.diag
                    .error_with_trace(&self.name, "download failed", e.to_string());
                None
            }
        }
    }
}
