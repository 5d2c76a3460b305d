//! Pipeline services

pub mod audio_normalizer;
pub mod media_fetcher;
pub mod source_resolver;

pub use audio_normalizer::AudioNormalizer;
pub use media_fetcher::MediaFetcher;
pub use source_resolver::SourceResolver;
