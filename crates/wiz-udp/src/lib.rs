// # WiZ UDP Transport
//
// This crate talks to WiZ bulbs over their local JSON-over-UDP protocol.
//
// ## Components
//
// - `WizUdpConnector` / `WizUdpBulb`: `DeviceConnector` and `BulbDevice`
//   over `getPilot` / `setPilot`, one datagram per request with resends
//   inside the configured timeout
// - `WizUdpDiscovery`: `BulbDiscovery` by broadcasting a `registration`
//   request and collecting responders
// - `AddressRange`: the range expressions discovery accepts
//
// ## Failure Mapping
//
// - No reply within the timeout → `DeviceError::Timeout`
// - Socket errors, ICMP unreachable, resolution failures →
//   `DeviceError::Unreachable`
// - Malformed replies or bulb-reported errors → `DeviceError::Protocol`

mod client;
mod discovery;
mod protocol;
mod range;

pub use client::{WizUdpBulb, WizUdpConnector};
pub use discovery::WizUdpDiscovery;
pub use range::AddressRange;
pub use wiz_core::config::WIZ_PORT;
