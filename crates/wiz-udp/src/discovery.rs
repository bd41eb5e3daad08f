//! Broadcast discovery
//!
//! Bulbs answer a `registration` datagram sent to the broadcast address of
//! their network. The request is repeated every second while replies are
//! collected, since broadcasts are easily lost.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};
use tracing::{debug, info};
use wiz_core::config::{DeviceConfig, DiscoveryConfig};
use wiz_core::traits::BulbDiscovery;
use wiz_core::Error;

use crate::protocol;
use crate::range::AddressRange;

/// Interval between repeated registration broadcasts
const REBROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Finds WiZ bulbs by UDP broadcast
#[derive(Debug, Clone)]
pub struct WizUdpDiscovery {
    port: u16,
    wait: Duration,
}

impl WizUdpDiscovery {
    /// Create a discovery client
    ///
    /// # Parameters
    ///
    /// - `port`: UDP port bulbs listen on (38899)
    /// - `wait`: How long replies are collected
    pub fn new(port: u16, wait: Duration) -> Self {
        Self { port, wait }
    }

    pub fn from_config(device: &DeviceConfig, discovery: &DiscoveryConfig) -> Self {
        Self::new(device.port, Duration::from_millis(discovery.wait_ms))
    }
}

#[async_trait::async_trait]
impl BulbDiscovery for WizUdpDiscovery {
    /// Broadcast a registration request and collect responders
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Responder addresses in reply order, without
    ///   duplicates
    /// - `Err(Error::InvalidInput)`: `range` cannot be parsed
    /// - `Err(Error::Discovery)`: The broadcast socket failed
    async fn discover(&self, range: &str) -> Result<Vec<String>, Error> {
        let range = AddressRange::parse(range)?;
        let target = SocketAddr::new(IpAddr::V4(range.broadcast()), self.port);

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::discovery(format!("Cannot bind discovery socket: {}", e)))?;
        socket
            .set_broadcast(true)
            .map_err(|e| Error::discovery(format!("Cannot enable broadcast: {}", e)))?;

        let request = protocol::registration();
        let deadline = Instant::now() + self.wait;
        let mut next_send = Instant::now();
        let mut found: Vec<String> = Vec::new();
        let mut buf = [0u8; 1024];

        debug!("Broadcasting registration to {} for {:?}", target, self.wait);

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            if now >= next_send {
                socket
                    .send_to(&request, target)
                    .await
                    .map_err(|e| Error::discovery(format!("Cannot send to {}: {}", target, e)))?;
                next_send = now + REBROADCAST_INTERVAL;
            }

            let wake = next_send.min(deadline);
            match timeout(wake.saturating_duration_since(now), socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    let ip = from.ip();
                    if !is_registration_reply(&buf[..len]) {
                        debug!("Ignoring non-registration datagram from {}", from);
                    } else if !range.contains(ip) {
                        debug!("Ignoring {} outside {}", ip, range);
                    } else {
                        let address = ip.to_string();
                        if !found.contains(&address) {
                            debug!("Bulb answered from {}", address);
                            found.push(address);
                        }
                    }
                }
                Ok(Err(e)) => {
                    debug!("Discovery receive error: {}", e);
                }
                Err(_) => {}
            }
        }

        info!("Discovery in {} found {} bulb(s)", range, found.len());
        Ok(found)
    }
}

fn is_registration_reply(bytes: &[u8]) -> bool {
    let Ok(reply) = serde_json::from_slice::<Value>(bytes) else {
        return false;
    };
    reply.get("method").and_then(Value::as_str) == Some(protocol::REGISTRATION)
        && reply.get("result").is_some_and(Value::is_object)
}
