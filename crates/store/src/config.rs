//! Persisted subtitle-provider configuration.
//!
//! Keys:
//! - `credential.apiKey`, `credential.username`, `credential.password`
//! - `addonUrls` — ordered, pipe-delimited list of addon endpoint URLs
//! - `addonUrl`  — legacy single-URL key, migrated to `addonUrls` and
//!   deleted the first time the list is read

use sqlx::SqlitePool;
use tracing::info;

use crate::settings;

pub const KEY_API_KEY: &str = "credential.apiKey";
pub const KEY_USERNAME: &str = "credential.username";
pub const KEY_PASSWORD: &str = "credential.password";
pub const KEY_ADDON_URLS: &str = "addonUrls";
pub const KEY_ADDON_URL_LEGACY: &str = "addonUrl";

/// Delimiter for the stored URL list. A pipe never appears un-encoded in a
/// URL, so splitting is unambiguous.
const URL_DELIMITER: char = '|';

/// Normalize an addon endpoint URL before storing or querying it:
/// trim whitespace, strip a `/manifest.json` suffix, strip trailing slashes.
pub fn normalize_addon_url(url: &str) -> String {
    let mut s = url.trim();
    if let Some(stripped) = s.strip_suffix("/manifest.json") {
        s = stripped;
    }
    s.trim_end_matches('/').to_string()
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for url in urls {
        if !url.is_empty() && !seen.contains(&url) {
            seen.push(url);
        }
    }
    seen
}

/// Config-store accessor for subtitle provider credentials and addon URLs.
#[derive(Clone)]
pub struct SubtitleConfig {
    pool: SqlitePool,
}

impl SubtitleConfig {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn api_key(&self) -> Result<Option<String>, sqlx::Error> {
        Ok(settings::get(&self.pool, KEY_API_KEY)
            .await?
            .filter(|v| !v.is_empty()))
    }

    pub async fn username(&self) -> Result<Option<String>, sqlx::Error> {
        Ok(settings::get(&self.pool, KEY_USERNAME)
            .await?
            .filter(|v| !v.is_empty()))
    }

    pub async fn password(&self) -> Result<Option<String>, sqlx::Error> {
        Ok(settings::get(&self.pool, KEY_PASSWORD)
            .await?
            .filter(|v| !v.is_empty()))
    }

    /// Store a credential field. An empty value clears the key.
    pub async fn set_credential(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        if value.is_empty() {
            settings::delete(&self.pool, key).await?;
        } else {
            settings::set(&self.pool, key, value).await?;
        }
        Ok(())
    }

    /// Ordered list of configured addon URLs, normalized and de-duplicated.
    ///
    /// On first read after an upgrade, a value under the legacy single-URL
    /// key is converted into list format and the legacy key is deleted, so
    /// existing installations keep their configured addon.
    pub async fn addon_urls(&self) -> Result<Vec<String>, sqlx::Error> {
        if let Some(raw) = settings::get(&self.pool, KEY_ADDON_URLS).await? {
            return Ok(parse_url_list(&raw));
        }

        // Legacy migration: single-URL key, read once, convert, delete.
        if let Some(legacy) = settings::get(&self.pool, KEY_ADDON_URL_LEGACY).await? {
            let urls = dedup_preserving_order(vec![normalize_addon_url(&legacy)]);
            self.write_url_list(&urls).await?;
            settings::delete(&self.pool, KEY_ADDON_URL_LEGACY).await?;
            info!(count = urls.len(), "migrated legacy addon URL key");
            return Ok(urls);
        }

        Ok(Vec::new())
    }

    /// Append a URL to the list; a URL already present (after normalization)
    /// is not added twice.
    pub async fn add_addon_url(&self, url: &str) -> Result<Vec<String>, sqlx::Error> {
        let mut urls = self.addon_urls().await?;
        urls.push(normalize_addon_url(url));
        let urls = dedup_preserving_order(urls);
        self.write_url_list(&urls).await?;
        Ok(urls)
    }

    /// Remove a URL (matched after normalization). Unknown URLs are a no-op.
    pub async fn remove_addon_url(&self, url: &str) -> Result<Vec<String>, sqlx::Error> {
        let target = normalize_addon_url(url);
        let urls: Vec<String> = self
            .addon_urls()
            .await?
            .into_iter()
            .filter(|u| *u != target)
            .collect();
        self.write_url_list(&urls).await?;
        Ok(urls)
    }

    /// Replace the whole list. Input order is preserved; duplicates collapse
    /// to their first occurrence.
    pub async fn set_addon_urls(&self, urls: &[String]) -> Result<Vec<String>, sqlx::Error> {
        let urls = dedup_preserving_order(
            urls.iter().map(|u| normalize_addon_url(u)).collect(),
        );
        self.write_url_list(&urls).await?;
        Ok(urls)
    }

    /// True when any credential-bearing mechanism is configured: an API key,
    /// a username+password pair, or at least one addon URL. Callers use this
    /// to short-circuit acquisition when nothing could possibly succeed.
    pub async fn has_credentials(&self) -> Result<bool, sqlx::Error> {
        if self.api_key().await?.is_some() {
            return Ok(true);
        }
        if self.username().await?.is_some() && self.password().await?.is_some() {
            return Ok(true);
        }
        Ok(!self.addon_urls().await?.is_empty())
    }

    async fn write_url_list(&self, urls: &[String]) -> Result<(), sqlx::Error> {
        let joined = urls.join(&URL_DELIMITER.to_string());
        settings::set(&self.pool, KEY_ADDON_URLS, &joined).await
    }
}

fn parse_url_list(raw: &str) -> Vec<String> {
    dedup_preserving_order(
        raw.split(URL_DELIMITER)
            .map(normalize_addon_url)
            .collect(),
    )
}
