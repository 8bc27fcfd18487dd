//! Placeholder providers for sources that were never wired up.
//!
//! Both report themselves enabled and return nothing, which keeps them in
//! the fallback loop and proves the orchestrator tolerates built-in sources
//! that yield no results.

use std::path::PathBuf;
use std::sync::Arc;

use subfin_core::SubtitleSearchResult;
use subfin_diaglog::DiagnosticLog;

use crate::provider::SubtitleProvider;

pub struct PodnapisiProvider {
    diag: Arc<DiagnosticLog>,
}

impl PodnapisiProvider {
    pub fn new(diag: Arc<DiagnosticLog>) -> Self {
        Self { diag }
    }
}

#[async_trait::async_trait]
impl SubtitleProvider for PodnapisiProvider {
    fn name(&self) -> &str {
        "podnapisi"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, _: Option<&str>, _: &str) -> Vec<SubtitleSearchResult> {
        self.diag.debug(
            self.name(),
            format!("search \"{query}\": provider not implemented, no results"),
        );
        Vec::new()
    }

    async fn download(&self, _: &SubtitleSearchResult) -> Option<PathBuf> {
        None
    }
}

pub struct SubsceneProvider {
    diag: Arc<DiagnosticLog>,
}

impl SubsceneProvider {
    pub fn new(diag: Arc<DiagnosticLog>) -> Self {
        Self { diag }
    }
}

#[async_trait::async_trait]
impl SubtitleProvider for SubsceneProvider {
    fn name(&self) -> &str {
        "subscene"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn search(&self, query: &str, _: Option<&str>, _: &str) -> Vec<SubtitleSearchResult> {
        self.diag.debug(
            self.name(),
            format!("search \"{query}\": provider not implemented, no results"),
        );
        Vec::new()
    }

    async fn download(&self, _: &SubtitleSearchResult) -> Option<PathBuf> {
        None
    }
}
