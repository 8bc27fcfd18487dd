pub mod cache;
pub mod moviehash;
pub mod opensubtitles;
pub mod provider;
pub mod stremio;
pub mod stubs;

pub use opensubtitles::{OpenSubtitlesCredentials, OpenSubtitlesProvider};
pub use provider::SubtitleProvider;
pub use stremio::StremioAddonProvider;
pub use stubs::{PodnapisiProvider, SubsceneProvider};

/// Fixed connect/read timeout applied to every provider request,
/// independent of any caller-supplied deadline.
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Shared client builder so every provider carries the same timeouts.
/// Building with only timeouts set cannot fail at runtime.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(REQUEST_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("http client with fixed timeouts")
}
