use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::{DEFAULT_BROADCAST_INTERVAL_MS, DEFAULT_PORT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Port the host binds. Clients bind an ephemeral port and send here.
    pub port: u16,
    pub broadcast_interval_ms: u64,
    pub max_clients: usize,
    /// Address embedded in lobby codes instead of the detected LAN address.
    pub advertise_addr: Option<Ipv4Addr>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            broadcast_interval_ms: DEFAULT_BROADCAST_INTERVAL_MS,
            max_clients: 16,
            advertise_addr: None,
        }
    }
}

impl SessionConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms.max(1))
    }
}
