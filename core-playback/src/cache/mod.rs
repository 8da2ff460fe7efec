//! # Media Cache Module
//!
//! Disk-backed cache shared by every clip the feed plays.
//!
//! ## Overview
//!
//! - [`CacheStore`]: bounded LRU store, one file per URL, byte ceiling
//!   enforced on every insertion
//! - [`CacheDataSource`]: cache-first byte provider handed to the engine,
//!   falling back to the host HTTP client and writing fetched bytes back
//! - [`CacheDataSourceFactory`]: shares one data source between the current
//!   clip, preloaded clips and cache warming
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CacheDataSourceFactory             │
//! │  - data_source()                       │
//! │  - warm()                              │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> CacheStore (LRU index + FileSystemAccess)
//!          ├──> HttpClient (misses)
//!          └──> BandwidthMeter (throughput samples)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheStore, CacheDataSourceFactory};
//!
//! # async fn example(fs: Arc<dyn FileSystemAccess>, http: Arc<dyn HttpClient>) -> Result<()> {
//! let store = Arc::new(CacheStore::open(fs, "/data/cache/reel_media_cache".into(), 512 << 20).await?);
//! let factory = CacheDataSourceFactory::new(store, http, Arc::new(BandwidthMeter::new()), Duration::from_secs(30));
//!
//! factory.warm("https://cdn.example.com/next.mp4").await?;
//! let stats = factory.store().stats().await;
//! println!("Cache size: {} MB", stats.total_bytes / 1_000_000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data_source;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::CacheConfig;
pub use data_source::{CacheDataSource, CacheDataSourceFactory};
pub use stats::CacheStats;
pub use store::CacheStore;
