use std::path::PathBuf;

use subfin_core::SubtitleSearchResult;

/// A pluggable subtitle source.
///
/// `search` and `download` never propagate errors across this boundary:
/// implementations catch internal failures, record them in the diagnostic
/// log, and collapse them to an empty list / `None`. The orchestrator must
/// check `enabled` before calling anything else.
#[async_trait::async_trait]
pub trait SubtitleProvider: Send + Sync {
    /// Stable, human-readable identity used in logs and as a UI label.
    fn name(&self) -> &str;

    /// Pure function of the configuration snapshot this instance was built
    /// from; performs no I/O.
    fn enabled(&self) -> bool;

    /// Remote lookup. Implementations apply language filtering themselves
    /// when the remote source does not filter server-side.
    async fn search(
        &self,
        query: &str,
        imdb_id: Option<&str>,
        language: &str,
    ) -> Vec<SubtitleSearchResult>;

    /// Fetch the payload referenced by `result`, decompress if the transport
    /// indicates compression, write it to the provider's cache location, and
    /// return the absolute path. `None` on any failure.
    async fn download(&self, result: &SubtitleSearchResult) -> Option<PathBuf>;
}
