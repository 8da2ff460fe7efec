//! Reachability-based connectivity for desktop hosts.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkType},
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

const DEFAULT_PROBE_ADDR: &str = "1.1.1.1:443";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// [`NetworkMonitor`] that opens a TCP connection to a well-known host.
///
/// Desktop platforms expose no portable way to tell Wi-Fi from Ethernet, so
/// a reachable probe is reported as an unmetered wired link with no
/// bandwidth estimate.
#[derive(Debug, Clone)]
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self {
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Probe `host:port` instead of the default.
    pub fn with_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = addr.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn probe(&self) -> NetworkInfo {
        match timeout(PROBE_TIMEOUT, TcpStream::connect(&self.probe_addr)).await {
            Ok(Ok(_)) => NetworkInfo::connected(NetworkType::Ethernet),
            Ok(Err(e)) => {
                debug!(addr = %self.probe_addr, error = %e, "Reachability probe failed");
                NetworkInfo::disconnected()
            }
            Err(_) => {
                debug!(addr = %self.probe_addr, "Reachability probe timed out");
                NetworkInfo::disconnected()
            }
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        Ok(self.probe().await)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(ProbeStream {
            monitor: self.clone(),
            last: None,
        }))
    }
}

/// Polls the probe and yields only when connectivity flips.
struct ProbeStream {
    monitor: DesktopNetworkMonitor,
    last: Option<bool>,
}

#[async_trait]
impl NetworkChangeStream for ProbeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            if self.last.is_some() {
                tokio::time::sleep(self.monitor.poll_interval).await;
            }

            let info = self.monitor.probe().await;
            let connected = info.is_connected();
            if self.last != Some(connected) {
                if self.last.is_some() {
                    info!(connected, "Desktop connectivity changed");
                }
                self.last = Some(connected);
                return Some(info);
            }
        }
    }
}
