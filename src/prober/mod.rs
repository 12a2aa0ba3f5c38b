pub mod checksum;
pub mod icmp;
pub mod packet;

/// Result of a single echo probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Round-trip time in seconds.
    Success { rtt: f64 },
    Failure { reason: String },
}

impl ProbeOutcome {
    pub fn rtt(&self) -> Option<f64> {
        match self {
            ProbeOutcome::Success { rtt } => Some(*rtt),
            ProbeOutcome::Failure { .. } => None,
        }
    }
}

/// Destination as given by the user and as resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub address: std::net::Ipv4Addr,
}

/// Echo identifier shared by every probe of this process.
pub fn run_identifier() -> u16 {
    (std::process::id() & 0xffff) as u16
}
