//! # Cache-Wrapping Data Source
//!
//! [`CacheDataSource`] is the byte provider handed to the media engine. Reads
//! are served from the [`CacheStore`] when present; otherwise the resource is
//! fetched through the host [`HttpClient`] and written back to the cache.
//!
//! ```text
//! engine ──fetch(url)──> CacheDataSource ──hit──> CacheStore
//!                              │
//!                              └──miss──> HttpClient ──put──> CacheStore
//! ```

use crate::cache::store::CacheStore;
use crate::error::{PlaybackError, Result};
use crate::network::BandwidthMeter;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::playback::DataSource;
use bytes::Bytes;
use core_runtime::logging::redact_url;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Cache-first [`DataSource`] with network fallback.
pub struct CacheDataSource {
    store: Arc<CacheStore>,
    http_client: Arc<dyn HttpClient>,
    meter: Arc<BandwidthMeter>,
    fetch_timeout: Duration,
}

impl CacheDataSource {
    pub fn new(
        store: Arc<CacheStore>,
        http_client: Arc<dyn HttpClient>,
        meter: Arc<BandwidthMeter>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            http_client,
            meter,
            fetch_timeout,
        }
    }

    async fn fetch_remote(&self, url: &str) -> BridgeResult<Bytes> {
        let request = HttpRequest::get(url).timeout(self.fetch_timeout);
        let started = Instant::now();

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            return Err(match response.status {
                401 | 403 => BridgeError::PermissionDenied(format!(
                    "HTTP {} for {}",
                    response.status,
                    redact_url(url)
                )),
                status => BridgeError::HttpStatus {
                    status,
                    url: redact_url(url),
                },
            });
        }

        self.meter
            .record(response.body.len() as u64, started.elapsed());
        Ok(response.body)
    }
}

#[async_trait]
impl DataSource for CacheDataSource {
    async fn fetch(&self, url: &str) -> BridgeResult<Bytes> {
        match self.store.get(url).await {
            Ok(Some(data)) => return Ok(data),
            Ok(None) => {}
            Err(e) => warn!(url = %redact_url(url), error = %e.redacted(), "Cache read failed"),
        }

        debug!(url = %redact_url(url), "Cache miss, fetching from network");
        let data = self.fetch_remote(url).await?;

        match self.store.put(url, data.clone()).await {
            Ok(true) => {}
            Ok(false) => debug!(url = %redact_url(url), size = data.len(), "Not cached: exceeds ceiling"),
            Err(e) => warn!(url = %redact_url(url), error = %e.redacted(), "Failed to cache fetched media"),
        }

        Ok(data)
    }
}

/// Hands out [`CacheDataSource`]s sharing one store, client and meter.
#[derive(Clone)]
pub struct CacheDataSourceFactory {
    source: Arc<CacheDataSource>,
}

impl CacheDataSourceFactory {
    pub fn new(
        store: Arc<CacheStore>,
        http_client: Arc<dyn HttpClient>,
        meter: Arc<BandwidthMeter>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source: Arc::new(CacheDataSource::new(
                store,
                http_client,
                meter,
                fetch_timeout,
            )),
        }
    }

    /// Data source to attach to a [`MediaSource`](bridge_traits::MediaSource).
    pub fn data_source(&self) -> Arc<dyn DataSource> {
        self.source.clone()
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.source.store
    }

    /// Pull `url` into the disk cache ahead of playback.
    ///
    /// Returns `Ok(false)` when it was already cached.
    pub async fn warm(&self, url: &str) -> Result<bool> {
        if self.source.store.contains(url).await {
            return Ok(false);
        }

        self.source
            .fetch(url)
            .await
            .map(|_| true)
            .map_err(PlaybackError::from)
    }
}
