// # Discovery Trait
//
// Defines the interface for enumerating bulbs on the network.
//
// ## Implementations
//
// - UDP broadcast: `wiz-udp` crate

use async_trait::async_trait;

/// Enumerates bulb addresses within an address range
///
/// Discovery is best-effort: the engine treats an error the same as an
/// empty result, so implementations should fail fast rather than guess.
#[async_trait]
pub trait BulbDiscovery: Send + Sync {
    /// Find bulbs answering within `range`
    ///
    /// # Parameters
    ///
    /// - `range`: Implementation-defined range expression (broadcast
    ///   address, CIDR, or empty for the default)
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Addresses in the order they answered, without duplicates
    /// - `Err(Error)`: Invalid range or enumeration failure
    async fn discover(&self, range: &str) -> Result<Vec<String>, crate::Error>;
}
