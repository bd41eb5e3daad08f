//! Discovery address ranges

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use wiz_core::Error;

/// Where discovery broadcasts, and which responders it keeps
///
/// Accepted forms:
/// - `""`: limited broadcast (`255.255.255.255`)
/// - `"192.168.1.255"`: a directed broadcast (or single) address
/// - `"10.0.0.0/24"`: an IPv4 network; broadcasts to its directed broadcast
///   address and keeps only responders inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRange {
    Limited,
    Address(Ipv4Addr),
    Network { network: Ipv4Addr, prefix: u8 },
}

impl AddressRange {
    /// Parse a range expression
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidInput)`: Not one of the accepted forms
    pub fn parse(range: &str) -> Result<Self, Error> {
        let range = range.trim();
        if range.is_empty() {
            return Ok(AddressRange::Limited);
        }

        match range.split_once('/') {
            Some((address, prefix)) => {
                let address = parse_ipv4(address, range)?;
                let prefix: u8 = prefix
                    .parse()
                    .ok()
                    .filter(|p| *p <= 32)
                    .ok_or_else(|| {
                        Error::invalid_input(format!("Invalid prefix length in '{}'", range))
                    })?;
                let network = Ipv4Addr::from(u32::from(address) & mask(prefix));
                Ok(AddressRange::Network { network, prefix })
            }
            None => Ok(AddressRange::Address(parse_ipv4(range, range)?)),
        }
    }

    /// Destination of the discovery datagram
    pub fn broadcast(&self) -> Ipv4Addr {
        match *self {
            AddressRange::Limited => Ipv4Addr::BROADCAST,
            AddressRange::Address(address) => address,
            AddressRange::Network { network, prefix } => {
                Ipv4Addr::from(u32::from(network) | !mask(prefix))
            }
        }
    }

    /// Whether a responder belongs to this range
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (*self, ip) {
            (AddressRange::Network { network, prefix }, IpAddr::V4(ip)) => {
                u32::from(ip) & mask(prefix) == u32::from(network)
            }
            (AddressRange::Network { .. }, IpAddr::V6(_)) => false,
            _ => true,
        }
    }
}

impl FromStr for AddressRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressRange::Limited => write!(f, "{}", Ipv4Addr::BROADCAST),
            AddressRange::Address(address) => write!(f, "{}", address),
            AddressRange::Network { network, prefix } => write!(f, "{}/{}", network, prefix),
        }
    }
}

fn parse_ipv4(address: &str, range: &str) -> Result<Ipv4Addr, Error> {
    address
        .trim()
        .parse()
        .map_err(|_| Error::invalid_input(format!("Invalid address range '{}'", range)))
}

fn mask(prefix: u8) -> u32 {
    u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0)
}
