//! Connectivity Reports
//!
//! The core reads the transport type to pick a bitrate ceiling, the
//! downstream estimate to decide whether preloading is worth it, and the
//! change stream to stall and recover playback.

use crate::error::Result;

/// Transport carrying the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkType {
    WiFi,
    Cellular,
    Ethernet,
    /// VPN, Bluetooth tethering, or anything the host cannot classify.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
    /// The host could not tell (e.g. captive portal checks still running).
    Indeterminate,
}

/// Snapshot of the host's connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    /// `None` while disconnected.
    pub network_type: Option<NetworkType>,
    pub is_metered: bool,
    /// OS downstream bandwidth estimate in kbps (Android's
    /// `NetworkCapabilities::getLinkDownstreamBandwidthKbps`). `None` when
    /// the platform has no estimate.
    pub downstream_kbps: Option<u32>,
}

impl NetworkInfo {
    /// Connected over `network_type`. Cellular counts as metered.
    pub fn connected(network_type: NetworkType) -> Self {
        Self {
            status: NetworkStatus::Connected,
            network_type: Some(network_type),
            is_metered: network_type == NetworkType::Cellular,
            downstream_kbps: None,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            network_type: None,
            is_metered: false,
            downstream_kbps: None,
        }
    }

    pub fn with_downstream_kbps(mut self, kbps: u32) -> Self {
        self.downstream_kbps = Some(kbps);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.status == NetworkStatus::Connected
    }
}

/// Host connectivity source.
///
/// Android backs this with `ConnectivityManager`, iOS with `NWPathMonitor`,
/// desktop with a reachability probe.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait::async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Current connectivity. Errors when the host lacks permission to read it.
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Stream of connectivity updates, starting with the current state.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

#[async_trait::async_trait]
pub trait NetworkChangeStream: Send {
    /// Next update; `None` once the host stops reporting.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
