// # IP Source Trait
//
// Defines the interface for obtaining the machine's current public IP.
//
// ## Implementations
//
// - HTTP trace endpoint: `dnsync-ip-http` crate
// - Operator override: [`StaticIpSource`]

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for IP source implementations
///
/// Called once per cycle. Implementations must not cache between calls and
/// must not retry; a failure aborts the current cycle only.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current IP address
    /// - `Err(Error)`: If unable to determine the current IP
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// IP source that always returns a fixed, operator-supplied address
#[derive(Debug, Clone, Copy)]
pub struct StaticIpSource {
    ip: IpAddr,
}

impl StaticIpSource {
    pub fn new(ip: IpAddr) -> Self {
        Self { ip }
    }
}

#[async_trait]
impl IpSource for StaticIpSource {
    async fn current(&self) -> Result<IpAddr, crate::Error> {
        Ok(self.ip)
    }

    fn source_name(&self) -> &'static str {
        "override"
    }
}
