//! Fallback behavior of the orchestrator, driven by scripted providers.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use subfin_core::SubtitleSearchResult;
use subfin_diaglog::{DiagnosticLog, LogLevel};
use subfin_downloader::SubtitleDownloader;
use subfin_providers::provider::SubtitleProvider;
use subfin_store::SubtitleConfig;

/// A provider with a fixed script: canned search results and a canned
/// download outcome, plus call counters.
struct Scripted {
    name: &'static str,
    enabled: bool,
    results: Vec<SubtitleSearchResult>,
    download_path: Option<PathBuf>,
    search_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl Scripted {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            enabled: true,
            results: Vec::new(),
            download_path: None,
            search_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    fn disabled(name: &'static str) -> Self {
        Self {
            enabled: false,
            ..Self::new(name)
        }
    }

    fn with_results(mut self, count: usize, download_path: Option<&str>) -> Self {
        self.results = (0..count)
            .map(|i| {
                let mut r = SubtitleSearchResult::new(
                    format!("{i}"),
                    format!("{}-result-{i}", self.name),
                    self.name,
                );
                r.language = "en".into();
                r
            })
            .collect();
        self.download_path = download_path.map(PathBuf::from);
        self
    }
}

#[async_trait::async_trait]
impl SubtitleProvider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn search(&self, _: &str, _: Option<&str>, _: &str) -> Vec<SubtitleSearchResult> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.results.clone()
    }

    async fn download(&self, _: &SubtitleSearchResult) -> Option<PathBuf> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.download_path.clone()
    }
}

fn downloader(providers: Vec<Arc<Scripted>>, diag: Arc<DiagnosticLog>) -> SubtitleDownloader {
    let boxed: Vec<Box<dyn SubtitleProvider>> = providers
        .into_iter()
        .map(|p| Box::new(ArcProvider(p)) as Box<dyn SubtitleProvider>)
        .collect();
    SubtitleDownloader::new(boxed, diag)
}

/// Lets a test keep counters while the downloader owns the provider.
struct ArcProvider(Arc<Scripted>);

#[async_trait::async_trait]
impl SubtitleProvider for ArcProvider {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn enabled(&self) -> bool {
        self.0.enabled()
    }
    async fn search(&self, q: &str, id: Option<&str>, lang: &str) -> Vec<SubtitleSearchResult> {
        self.0.search(q, id, lang).await
    }
    async fn download(&self, r: &SubtitleSearchResult) -> Option<PathBuf> {
        self.0.download(r).await
    }
}

#[tokio::test]
async fn first_successful_provider_wins() {
    let diag = Arc::new(DiagnosticLog::default());
    let empty = Arc::new(Scripted::new("first"));
    let failing = Arc::new(Scripted::new("second").with_results(1, None));
    let winning = Arc::new(Scripted::new("third").with_results(1, Some("/tmp/sub.srt")));

    let dl = downloader(vec![empty.clone(), failing.clone(), winning.clone()], diag.clone());
    let path = dl.search_and_download("Movie.mkv", Some("tt1"), "en").await;

    assert_eq!(path, Some(PathBuf::from("/tmp/sub.srt")));
    assert_eq!(empty.search_calls.load(Ordering::SeqCst), 1);
    assert_eq!(failing.search_calls.load(Ordering::SeqCst), 1);
    assert_eq!(winning.search_calls.load(Ordering::SeqCst), 1);

    // Attempts recorded in provider order.
    let attempts: Vec<String> = diag
        .entries()
        .iter()
        .filter(|e| e.message.starts_with("trying provider"))
        .map(|e| e.message.clone())
        .collect();
    assert_eq!(
        attempts,
        vec![
            "trying provider first",
            "trying provider second",
            "trying provider third"
        ]
    );
}

#[tokio::test]
async fn success_stops_the_walk() {
    let diag = Arc::new(DiagnosticLog::default());
    let winning = Arc::new(Scripted::new("first").with_results(1, Some("/tmp/first.srt")));
    let untouched = Arc::new(Scripted::new("second").with_results(1, Some("/tmp/second.srt")));

    let dl = downloader(vec![winning.clone(), untouched.clone()], diag);
    let path = dl.search_and_download("Movie.mkv", None, "en").await;

    assert_eq!(path, Some(PathBuf::from("/tmp/first.srt")));
    assert_eq!(untouched.search_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disabled_provider_is_never_queried() {
    let diag = Arc::new(DiagnosticLog::default());
    let disabled = Arc::new(Scripted::disabled("locked"));
    let active = Arc::new(Scripted::new("active").with_results(1, Some("/tmp/a.srt")));

    let dl = downloader(vec![disabled.clone(), active.clone()], diag.clone());
    dl.search_and_download("Movie.mkv", None, "en").await;

    assert_eq!(disabled.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(disabled.download_calls.load(Ordering::SeqCst), 0);

    let entries = diag.entries();
    assert!(entries.iter().any(|e| {
        e.level == LogLevel::Debug && e.message == "skipping disabled provider locked"
    }));
    assert!(!entries.iter().any(|e| e.message == "trying provider locked"));
}

#[tokio::test]
async fn total_failure_returns_none_with_only_skip_entries() {
    let diag = Arc::new(DiagnosticLog::default());
    let a = Arc::new(Scripted::disabled("a"));
    let b = Arc::new(Scripted::disabled("b"));

    let dl = downloader(vec![a, b], diag.clone());
    let path = dl.search_and_download("Movie.mkv", None, "en").await;

    assert!(path.is_none());
    let entries = diag.entries();
    assert!(!entries.iter().any(|e| e.message.starts_with("trying provider")));
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.message.starts_with("skipping disabled provider"))
            .count(),
        2
    );
    assert!(entries.iter().any(|e| e.message.contains("no subtitle found")));
}

#[tokio::test]
async fn failed_download_is_not_retried_with_another_result() {
    let diag = Arc::new(DiagnosticLog::default());
    // Three candidates, but only the first may ever be attempted.
    let flaky = Arc::new(Scripted::new("flaky").with_results(3, None));
    let backup = Arc::new(Scripted::new("backup").with_results(1, Some("/tmp/b.srt")));

    let dl = downloader(vec![flaky.clone(), backup.clone()], diag.clone());
    let path = dl.search_and_download("Movie.mkv", None, "en").await;

    assert_eq!(path, Some(PathBuf::from("/tmp/b.srt")));
    assert_eq!(flaky.download_calls.load(Ordering::SeqCst), 1);
    assert!(diag.entries().iter().any(|e| {
        e.level == LogLevel::Warning && e.message == "download failed from flaky"
    }));
}

#[tokio::test]
async fn providers_built_in_configuration_order() {
    let pool = subfin_store::connect(":memory:").await.unwrap();
    subfin_store::migrate::run(&pool).await.unwrap();
    let config = SubtitleConfig::new(pool);
    config.add_addon_url("https://first.example").await.unwrap();
    config.add_addon_url("https://second.example").await.unwrap();

    let diag = Arc::new(DiagnosticLog::default());
    let dl = SubtitleDownloader::from_config(&config, std::env::temp_dir(), diag)
        .await
        .unwrap();

    assert_eq!(
        dl.provider_names(),
        vec![
            "addon:first.example",
            "addon:second.example",
            "opensubtitles",
            "podnapisi",
            "subscene"
        ]
    );
}
