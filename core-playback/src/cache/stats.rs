//! Cache statistics

use serde::{Deserialize, Serialize};

/// Snapshot of the disk cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: usize,

    /// Bytes used by cached entries
    pub total_bytes: u64,

    /// Byte ceiling
    pub capacity_bytes: u64,

    /// Reads served from disk
    pub hits: u64,

    /// Reads that had to go to the network
    pub misses: u64,

    /// Entries removed to make room
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate cache usage as a percentage of the ceiling.
    pub fn usage_percentage(&self) -> f64 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.capacity_bytes as f64) * 100.0
    }

    /// Returns true if the cache is near capacity (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Fraction of reads served from disk, `0.0` before any read.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    /// Returns average bytes per entry.
    pub fn average_entry_size(&self) -> u64 {
        if self.entries == 0 {
            0
        } else {
            self.total_bytes / self.entries as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_and_hit_rate() {
        let stats = CacheStats {
            entries: 4,
            total_bytes: 950,
            capacity_bytes: 1000,
            hits: 3,
            misses: 1,
            evictions: 0,
        };

        assert_eq!(stats.usage_percentage(), 95.0);
        assert!(stats.is_near_capacity());
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.average_entry_size(), 237);
    }

    #[test]
    fn test_empty_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.usage_percentage(), 0.0);
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.average_entry_size(), 0);
    }
}
