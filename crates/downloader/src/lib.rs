//! Subtitle acquisition orchestrator.
//!
//! Builds the ordered provider list from configuration and walks it with a
//! "first success wins" fallback: the first provider whose top-ranked result
//! downloads cleanly ends the run. Result lists are not explored further and
//! no provider is retried with an alternate result.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use subfin_diaglog::DiagnosticLog;
use subfin_providers::provider::SubtitleProvider;
use subfin_providers::{
    OpenSubtitlesCredentials, OpenSubtitlesProvider, PodnapisiProvider, StremioAddonProvider,
    SubsceneProvider,
};
use subfin_store::SubtitleConfig;

/// Source label the orchestrator uses in the diagnostic log.
const SOURCE: &str = "downloader";

pub struct SubtitleDownloader {
    providers: Vec<Box<dyn SubtitleProvider>>,
    diag: Arc<DiagnosticLog>,
}

impl SubtitleDownloader {
    /// Provider order: one addon instance per configured URL, in
    /// configuration order, then the built-ins in fixed declared order.
    pub async fn from_config(
        config: &SubtitleConfig,
        cache_dir: PathBuf,
        diag: Arc<DiagnosticLog>,
    ) -> Result<Self, sqlx::Error> {
        let mut providers: Vec<Box<dyn SubtitleProvider>> = Vec::new();

        for url in config.addon_urls().await? {
            providers.push(Box::new(StremioAddonProvider::new(
                &url,
                cache_dir.clone(),
                diag.clone(),
            )));
        }

        let credentials = OpenSubtitlesCredentials {
            api_key: config.api_key().await?,
            username: config.username().await?,
            password: config.password().await?,
        };
        providers.push(Box::new(OpenSubtitlesProvider::new(
            credentials,
            cache_dir,
            diag.clone(),
        )));
        providers.push(Box::new(PodnapisiProvider::new(diag.clone())));
        providers.push(Box::new(SubsceneProvider::new(diag.clone())));

        Ok(Self::new(providers, diag))
    }

    /// Assemble from an explicit provider list (tests, embedding).
    pub fn new(providers: Vec<Box<dyn SubtitleProvider>>, diag: Arc<DiagnosticLog>) -> Self {
        Self { providers, diag }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Walk the provider list and return the first successfully downloaded
    /// subtitle path. `None` only after every provider was tried or skipped.
    pub async fn search_and_download(
        &self,
        filename: &str,
        imdb_id: Option<&str>,
        language: &str,
    ) -> Option<PathBuf> {
        info!(filename, ?imdb_id, language, "subtitle search starting");
        self.diag.info(
            SOURCE,
            format!("searching subtitles for \"{filename}\" ({language})"),
        );

        for provider in &self.providers {
            let name = provider.name();

            if !provider.enabled() {
                debug!(provider = name, "provider disabled, skipping");
                self.diag
                    .debug(SOURCE, format!("skipping disabled provider {name}"));
                continue;
            }

            self.diag.info(SOURCE, format!("trying provider {name}"));
            let results = provider.search(filename, imdb_id, language).await;
            if results.is_empty() {
                self.diag
                    .info(SOURCE, format!("no results from {name}"));
                continue;
            }

            // Only the provider's top-ranked result is attempted.
            let best = &results[0];
            self.diag.info(
                SOURCE,
                format!("downloading \"{}\" from {name}", best.name),
            );
            match provider.download(best).await {
                Some(path) => {
                    info!(provider = name, path = %path.display(), "subtitle downloaded");
                    self.diag.info(
                        SOURCE,
                        format!("success: {name} -> {}", path.display()),
                    );
                    return Some(path);
                }
                None => {
                    self.diag
                        .warning(SOURCE, format!("download failed from {name}"));
                }
            }
        }

        warn!(filename, "no subtitle found from any provider");
        self.diag
            .warning(SOURCE, format!("no subtitle found for \"{filename}\""));
        None
    }
}
