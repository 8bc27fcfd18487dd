use serde::{Deserialize, Serialize};

/// A single subtitle candidate returned by a provider search.
///
/// Produced by `search`, consumed by `download`; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSearchResult {
    /// Provider-local identifier (file id, addon subtitle id, …).
    pub id: String,
    /// Display / release label.
    pub name: String,
    /// ISO 639-1 two-letter language code.
    pub language: String,
    /// Popularity count as reported by the provider.
    #[serde(default)]
    pub downloads: u64,
    /// Provider-reported rating.
    #[serde(default)]
    pub rating: f64,
    /// URL (or provider-resolvable reference) to the subtitle payload.
    pub download_url: String,
    /// Name of the provider that produced this result.
    pub provider: String,
}

impl SubtitleSearchResult {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: String::new(),
            downloads: 0,
            rating: 0.0,
            download_url: String::new(),
            provider: provider.into(),
        }
    }
}
