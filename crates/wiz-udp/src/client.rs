//! UDP device client

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout};
use tracing::{debug, trace};
use wiz_core::config::DeviceConfig;
use wiz_core::traits::{BulbDevice, DeviceConnector, RawStatus};
use wiz_core::DeviceError;

use crate::protocol::{self, Decoded, PilotParams};

/// Largest reply a bulb sends
const MAX_DATAGRAM: usize = 2048;

/// Opens UDP connections to WiZ bulbs
#[derive(Debug, Clone)]
pub struct WizUdpConnector {
    port: u16,
    timeout: Duration,
    send_attempts: u32,
}

impl WizUdpConnector {
    /// Create a connector
    ///
    /// # Parameters
    ///
    /// - `port`: UDP port bulbs listen on (38899)
    /// - `timeout`: Upper bound for one request, resends included
    /// - `send_attempts`: Datagrams sent within `timeout` (at least 1)
    pub fn new(port: u16, timeout: Duration, send_attempts: u32) -> Self {
        Self {
            port,
            timeout,
            send_attempts: send_attempts.max(1),
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.port,
            Duration::from_millis(config.timeout_ms),
            config.send_attempts,
        )
    }

    async fn resolve(&self, address: &str) -> Result<SocketAddr, DeviceError> {
        if let Ok(ip) = address.parse() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let mut resolved = tokio::net::lookup_host((address, self.port))
            .await
            .map_err(|e| DeviceError::unreachable(address, format!("cannot resolve: {}", e)))?;
        resolved
            .next()
            .ok_or_else(|| DeviceError::unreachable(address, "cannot resolve: no addresses"))
    }
}

#[async_trait::async_trait]
impl DeviceConnector for WizUdpConnector {
    async fn connect(&self, address: &str) -> Result<Box<dyn BulbDevice>, DeviceError> {
        let target = self.resolve(address).await?;
        Ok(Box::new(WizUdpBulb {
            address: address.to_string(),
            target,
            timeout: self.timeout,
            send_attempts: self.send_attempts,
        }))
    }
}

/// One WiZ bulb reached over UDP
#[derive(Debug)]
pub struct WizUdpBulb {
    address: String,
    target: SocketAddr,
    timeout: Duration,
    send_attempts: u32,
}

impl WizUdpBulb {
    /// Send `payload` and wait for the reply to `method`
    ///
    /// The datagram is resent at even intervals until a reply arrives,
    /// `send_attempts` datagrams have been sent, or the timeout elapses.
    async fn request(&self, method: &str, payload: &[u8]) -> Result<Value, DeviceError> {
        let unreachable = |e: std::io::Error| DeviceError::unreachable(&self.address, e);

        let local: SocketAddr = if self.target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await.map_err(unreachable)?;
        socket.connect(self.target).await.map_err(unreachable)?;

        let deadline = Instant::now() + self.timeout;
        let resend_interval = self.timeout / self.send_attempts;
        let mut buf = [0u8; MAX_DATAGRAM];
        let mut sent = 0;
        let mut next_send = Instant::now();

        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!("{} did not answer {} in time", self.address, method);
                return Err(DeviceError::timeout(&self.address, self.timeout));
            }

            if sent < self.send_attempts && now >= next_send {
                trace!("Sending {} to {} (attempt {})", method, self.target, sent + 1);
                socket.send(payload).await.map_err(unreachable)?;
                sent += 1;
                next_send = now + resend_interval;
            }

            let wake = if sent < self.send_attempts {
                next_send.min(deadline)
            } else {
                deadline
            };

            match timeout(wake.saturating_duration_since(now), socket.recv(&mut buf)).await {
                Ok(Ok(len)) => match protocol::decode_reply(&buf[..len], method, &self.address)? {
                    Decoded::Result(result) => return Ok(result),
                    Decoded::Unrelated => {
                        trace!("Ignoring unrelated datagram from {}", self.address);
                    }
                },
                // ICMP port unreachable surfaces here on a connected socket
                Ok(Err(e)) => return Err(unreachable(e)),
                Err(_) => {}
            }
        }
    }

    async fn set_pilot(&self, params: PilotParams) -> Result<(), DeviceError> {
        let result = self
            .request(protocol::SET_PILOT, &protocol::set_pilot(params))
            .await?;
        protocol::ensure_success(&result, &self.address)
    }
}

#[async_trait::async_trait]
impl BulbDevice for WizUdpBulb {
    fn address(&self) -> &str {
        &self.address
    }

    async fn query_status(&self) -> Result<RawStatus, DeviceError> {
        let result = self
            .request(protocol::GET_PILOT, &protocol::get_pilot())
            .await?;
        Ok(RawStatus::new(result))
    }

    async fn power(&self, on: bool) -> Result<(), DeviceError> {
        self.set_pilot(PilotParams::power(on)).await
    }

    async fn apply_scene(&self, scene_id: u32, brightness: Option<u8>) -> Result<(), DeviceError> {
        self.set_pilot(PilotParams::scene(scene_id, brightness)).await
    }
}
