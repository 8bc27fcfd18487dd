//! Diagnostic ring-buffer log for subtitle acquisition.
//!
//! Every provider and the orchestrator mirror their progress into one shared
//! [`DiagnosticLog`] so that a field failure ("why did no subtitle come
//! back?") can be reconstructed after the fact. The buffer is capacity
//! bounded; the oldest entries are evicted first. This sits alongside
//! `tracing`, which handles live console output; the ring exists for export.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 200;

/// Marker emitted by `export` when the ring is empty.
const EMPTY_MARKER: &str = "(no subtitle search attempts recorded)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic entry. Owned by the ring; lifecycle bounded by eviction
/// and explicit clear.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

/// Full export of the ring as a value, for callers that want to forward
/// diagnostics to a crash-reporting sink without any panic transport.
#[derive(Debug, Clone)]
pub struct DiagnosticDump {
    pub generated_at: DateTime<Utc>,
    pub entry_count: usize,
    pub text: String,
}

/// Process-wide, capacity-bounded diagnostic log.
///
/// Shared via `Arc`; every read/append/clear goes through the internal lock.
pub struct DiagnosticLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn append(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        stack_trace: Option<String>,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            source: source.to_string(),
            message: message.into(),
            stack_trace,
        };
        // A zero-capacity ring retains nothing.
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn debug(&self, source: &str, message: impl Into<String>) {
        self.append(LogLevel::Debug, source, message, None);
    }

    pub fn info(&self, source: &str, message: impl Into<String>) {
        self.append(LogLevel::Info, source, message, None);
    }

    pub fn warning(&self, source: &str, message: impl Into<String>) {
        self.append(LogLevel::Warning, source, message, None);
    }

    pub fn error(&self, source: &str, message: impl Into<String>) {
        self.append(LogLevel::Error, source, message, None);
    }

    /// Error entry carrying a captured failure chain as a pseudo stack trace.
    pub fn error_with_trace(&self, source: &str, message: impl Into<String>, trace: String) {
        self.append(LogLevel::Error, source, message, Some(trace));
    }

    // Appends never panic while holding the lock, but recover from
    // poisoning anyway: a diagnostic log must not take the caller down.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Idempotent; clearing an empty ring is a no-op.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Render the whole ring as a human-readable text block.
    pub fn export(&self) -> String {
        let entries = self.entries();
        let mut out = String::new();
        out.push_str("=== Subtitle Debug Log ===\n");
        out.push_str(&format!(
            "Generated: {}\n\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC")
        ));

        if entries.is_empty() {
            out.push_str(EMPTY_MARKER);
            out.push('\n');
            return out;
        }

        for entry in &entries {
            out.push_str(&format!(
                "{} [{}] {}: {}\n",
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.level,
                entry.source,
                entry.message
            ));
            if let Some(trace) = &entry.stack_trace {
                for line in trace.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Export plus metadata, as a value. Replaces the legacy "throw a fatal
    /// error carrying the log text" transport: the caller decides whether to
    /// hand this to a crash-reporting sink.
    pub fn dump(&self) -> DiagnosticDump {
        DiagnosticDump {
            generated_at: Utc::now(),
            entry_count: self.len(),
            text: self.export(),
        }
    }

    /// Write the export to the first writable location in `locations`
    /// (primary → secondary app-private → tertiary best-effort backup).
    /// Returns the written file path, or `None` when every location failed.
    pub fn save(&self, locations: &[PathBuf]) -> Option<PathBuf> {
        let filename = format!(
            "subtitle_debug_{}.log",
            Utc::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let text = self.export();

        for dir in locations {
            match write_export(dir, &filename, &text) {
                Ok(path) => return Some(path),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "debug log location not writable");
                }
            }
        }
        None
    }
}

fn write_export(dir: &Path, filename: &str, text: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_evicts_oldest_beyond_capacity() {
        let log = DiagnosticLog::new(200);
        for i in 0..250 {
            log.info("test", format!("entry {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 200);
        assert_eq!(entries[0].message, "entry 50");
        assert_eq!(entries[199].message, "entry 249");
    }

    #[test]
    fn degenerate_capacities_stay_bounded() {
        let log = DiagnosticLog::new(0);
        for _ in 0..10 {
            log.info("test", "dropped");
        }
        assert!(log.is_empty());

        let log = DiagnosticLog::new(1);
        for i in 0..10 {
            log.info("test", format!("entry {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "entry 9");
    }

    #[test]
    fn clear_is_idempotent_and_export_shows_marker() {
        let log = DiagnosticLog::new(10);
        log.error("opensubtitles", "login failed");
        log.clear();
        log.clear();
        assert!(log.is_empty());
        assert!(log.export().contains("no subtitle search attempts recorded"));
    }

    #[test]
    fn export_includes_level_source_and_trace() {
        let log = DiagnosticLog::new(10);
        log.debug("downloader", "skipping disabled provider");
        log.error_with_trace(
            "addon:x.io",
            "manifest fetch failed",
            "transport failure: connection refused\ncaused by: dns".to_string(),
        );

        let text = log.export();
        assert!(text.contains("[DEBUG] downloader: skipping disabled provider"));
        assert!(text.contains("[ERROR] addon:x.io: manifest fetch failed"));
        assert!(text.contains("    transport failure: connection refused"));
        assert!(text.contains("    caused by: dns"));
    }

    #[test]
    fn dump_carries_text_and_count() {
        let log = DiagnosticLog::new(10);
        log.info("downloader", "search start");
        let dump = log.dump();
        assert_eq!(dump.entry_count, 1);
        assert!(dump.text.contains("search start"));
    }

    #[test]
    fn save_falls_through_to_writable_location() {
        let log = DiagnosticLog::new(10);
        log.info("test", "hello");

        let unwritable = PathBuf::from("/proc/definitely/not/writable");
        let tmp = std::env::temp_dir().join(format!("subfin_diag_{}", std::process::id()));
        let path = log.save(&[unwritable, tmp.clone()]).unwrap();
        assert!(path.starts_with(&tmp));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("hello"));
        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn save_reaches_tertiary_location() {
        let log = DiagnosticLog::new(10);
        log.info("test", "third time lucky");

        let tmp = std::env::temp_dir().join(format!("subfin_diag3_{}", std::process::id()));
        let locations = vec![
            PathBuf::from("/proc/nope/primary"),
            PathBuf::from("/proc/nope/secondary"),
            tmp.clone(),
        ];
        let path = log.save(&locations).unwrap();
        assert!(path.starts_with(&tmp));
        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn save_returns_none_when_all_fail() {
        let log = DiagnosticLog::new(10);
        let locations = vec![
            PathBuf::from("/proc/nope/a"),
            PathBuf::from("/proc/nope/b"),
        ];
        assert!(log.save(&locations).is_none());
    }
}
