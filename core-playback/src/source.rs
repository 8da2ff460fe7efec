//! # Source Construction
//!
//! Picks the container family for a media URL and wraps it in a
//! [`MediaSource`] backed by the shared cache data source.

use crate::cache::CacheDataSourceFactory;
use bridge_traits::playback::{MediaSource, SourceType};
use tracing::debug;
use url::Url;

/// Detect the source type from the extension of the URL path.
///
/// Query string and fragment are ignored and the comparison is case
/// insensitive. Anything that is not a playlist or manifest is progressive.
///
/// # Example
///
/// ```rust
/// use bridge_traits::SourceType;
/// use core_playback::source::detect_source_type;
///
/// assert_eq!(detect_source_type("https://cdn.example.com/v/1/master.M3U8?token=abc"), SourceType::Hls);
/// assert_eq!(detect_source_type("https://cdn.example.com/v/1/clip.mp4"), SourceType::Progressive);
/// ```
pub fn detect_source_type(url: &str) -> SourceType {
    let extension = match Url::parse(url) {
        Ok(parsed) => path_extension(parsed.path()),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            path_extension(&url[..end])
        }
    };

    match extension.as_deref() {
        Some("m3u8") => SourceType::Hls,
        Some("mpd") => SourceType::Dash,
        _ => SourceType::Progressive,
    }
}

fn path_extension(path: &str) -> Option<String> {
    let last_segment = path.rsplit('/').next()?;
    let (_, extension) = last_segment.rsplit_once('.')?;
    Some(extension.to_ascii_lowercase())
}

/// Build the engine source for `url`, reading through the cache.
pub fn build_source(url: &str, factory: &CacheDataSourceFactory) -> MediaSource {
    let source_type = detect_source_type(url);
    debug!(?source_type, "Building media source");

    MediaSource {
        url: url.to_string(),
        source_type,
        data_source: factory.data_source(),
    }
}
