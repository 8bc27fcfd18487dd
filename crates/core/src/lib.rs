pub mod error;
pub mod types;

pub use error::ProviderError;
pub use types::SubtitleSearchResult;
