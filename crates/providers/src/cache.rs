//! Subtitle cache-file handling shared by the concrete providers.
//!
//! Downloaded payloads land as `subtitle_<language>_<epoch-millis>.<ext>`
//! under a process-private cache directory; the millisecond timestamp keys
//! concurrent downloads apart.

use std::io::Read;
use std::path::{Path, PathBuf};

use subfin_core::ProviderError;

/// Extensions we accept when inferring the output format from a URL.
const KNOWN_EXTENSIONS: &[&str] = &["srt", "sub", "ass", "ssa", "vtt"];

/// Fallback when neither the response content type nor the URL is conclusive.
pub const DEFAULT_EXTENSION: &str = "srt";

/// Infer the output file extension from the response content type, falling
/// back to the source URL's suffix, then to [`DEFAULT_EXTENSION`].
pub fn infer_extension(content_type: Option<&str>, url: &str) -> &'static str {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("subrip") {
            return "srt";
        }
        if ct.contains("vtt") {
            return "vtt";
        }
        if ct.contains("ssa") {
            return "ssa";
        }
        if ct.contains("ass") {
            return "ass";
        }
    }

    // Strip any query string before looking at the suffix.
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if let Some((_, ext)) = path.rsplit_once('.') {
        let lower = ext.to_ascii_lowercase();
        if let Some(known) = KNOWN_EXTENSIONS.iter().find(|k| **k == lower) {
            return known;
        }
    }

    DEFAULT_EXTENSION
}

/// Decode a gzip-compressed payload.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Write subtitle bytes into the cache directory and return the file path.
pub fn write_subtitle(
    cache_dir: &Path,
    language: &str,
    ext: &str,
    data: &[u8],
) -> Result<PathBuf, ProviderError> {
    std::fs::create_dir_all(cache_dir)
        .map_err(|e| ProviderError::Storage(format!("create cache dir: {e}")))?;

    let lang = if language.is_empty() { "und" } else { language };
    let millis = chrono::Utc::now().timestamp_millis();
    let path = cache_dir.join(format!("subtitle_{lang}_{millis}.{ext}"));

    std::fs::write(&path, data)
        .map_err(|e| ProviderError::Storage(format!("write {}: {e}", path.display())))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn extension_from_content_type_wins() {
        assert_eq!(infer_extension(Some("application/x-subrip"), "http://x/file.vtt"), "srt");
        assert_eq!(infer_extension(Some("text/vtt; charset=utf-8"), "http://x/file"), "vtt");
    }

    #[test]
    fn extension_from_url_suffix() {
        assert_eq!(infer_extension(None, "http://x/subs/movie.ass"), "ass");
        assert_eq!(infer_extension(None, "http://x/subs/movie.VTT?token=1"), "vtt");
        assert_eq!(infer_extension(Some("application/octet-stream"), "http://x/a.srt"), "srt");
    }

    #[test]
    fn extension_defaults_to_srt() {
        assert_eq!(infer_extension(None, "http://x/download/12345"), "srt");
        assert_eq!(infer_extension(Some("application/octet-stream"), "http://x/d.json"), "srt");
    }

    #[test]
    fn gunzip_round_trips() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"1\n00:00:01,000 --> 00:00:02,000\nHello\n").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = gunzip(&compressed).unwrap();
        assert!(decoded.starts_with(b"1\n"));
    }

    #[test]
    fn write_subtitle_names_file_by_language() {
        let tmp = std::env::temp_dir().join(format!("subfin_cache_{}", std::process::id()));
        let path = write_subtitle(&tmp, "en", "srt", b"payload").unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("subtitle_en_"));
        assert!(name.ends_with(".srt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn write_subtitle_unknown_language_uses_und() {
        let tmp = std::env::temp_dir().join(format!("subfin_cache_und_{}", std::process::id()));
        let path = write_subtitle(&tmp, "", "srt", b"x").unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("subtitle_und_"));
        std::fs::remove_dir_all(&tmp).ok();
    }
}
