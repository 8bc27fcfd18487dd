use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use subfin_diaglog::DiagnosticLog;
use subfin_downloader::SubtitleDownloader;
use subfin_store::SubtitleConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(filename), Some(language)) = (args.next(), args.next()) else {
        eprintln!("usage: subfin <filename> <language> [imdb-id]");
        std::process::exit(2);
    };
    let imdb_id = args.next();

    let db_path = std::env::var("SUBFIN_DB").unwrap_or_else(|_| "subfin.db".to_string());
    info!(db_path = %db_path, "connecting to config store");
    let pool = subfin_store::connect(&db_path)
        .await
        .context("failed to connect to config store")?;
    subfin_store::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    let config = SubtitleConfig::new(pool);

    if !config.has_credentials().await? {
        eprintln!("no subtitle providers configured (no credentials or addon URLs)");
        std::process::exit(1);
    }

    let cache_dir: PathBuf = std::env::var("SUBFIN_CACHE_DIR")
        .unwrap_or_else(|_| "/tmp/subfin_cache".to_string())
        .into();

    let diag = Arc::new(DiagnosticLog::default());
    let downloader =
        SubtitleDownloader::from_config(&config, cache_dir.clone(), diag.clone()).await?;

    let result = downloader
        .search_and_download(&filename, imdb_id.as_deref(), &language)
        .await;

    // Optional debug-log export for support bundles. Fallback chain:
    // requested dir, then the app-private cache dir, then a temp dir.
    if let Ok(dir) = std::env::var("SUBFIN_DEBUG_EXPORT") {
        let locations = vec![
            PathBuf::from(&dir),
            cache_dir.join("debug"),
            std::env::temp_dir().join("subfin_debug"),
        ];
        match diag.save(&locations) {
            Some(path) => info!(path = %path.display(), "debug log exported"),
            None => eprintln!("debug log export failed for every location"),
        }
    }

    match result {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => {
            eprintln!("no subtitle found");
            std::process::exit(1);
        }
    }
}
