use super::checksum::checksum;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_TIME_EXCEEDED: u8 = 11;

/// Raw IPv4 sockets hand us the IP header too; options are not supported.
pub const IPV4_HEADER_LEN: usize = 20;
const IPPROTO_ICMP: u8 = 1;
pub const ICMP_HEADER_LEN: usize = 8;
pub const TIMESTAMP_LEN: usize = 8;
pub const ECHO_REQUEST_LEN: usize = ICMP_HEADER_LEN + TIMESTAMP_LEN;

const UNREACHABLE_REASONS: [&str; 16] = [
    "Destination network unreachable",
    "Destination host unreachable",
    "Destination protocol unreachable",
    "Destination port unreachable",
    "Fragmentation required, and DF flag set",
    "Source route failed",
    "Destination network unknown",
    "Destination host unknown",
    "Source host isolated",
    "Network administratively prohibited",
    "Host administratively prohibited",
    "Network unreachable for ToS",
    "Host unreachable for ToS",
    "Communication administratively prohibited",
    "Host precedence violation",
    "Precedence cutoff in effect",
];

const TIME_EXCEEDED_REASONS: [&str; 2] = [
    "TTL expired in transit",
    "Fragment reassembly time exceeded",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EchoRequest {
    pub identifier: u16,
    pub sequence: u16,
    /// Seconds since the unix epoch, echoed back by the peer.
    pub send_time: f64,
}

impl EchoRequest {
    pub fn new(identifier: u16, sequence: u16, send_time: f64) -> Self {
        Self { identifier, sequence, send_time }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(ECHO_REQUEST_LEN);
        packet.push(ICMP_ECHO_REQUEST);
        packet.push(0);
        packet.extend_from_slice(&[0, 0]);
        packet.extend_from_slice(&self.identifier.to_be_bytes());
        packet.extend_from_slice(&self.sequence.to_be_bytes());
        packet.extend_from_slice(&self.send_time.to_be_bytes());

        let sum = checksum(&packet);
        packet[2..4].copy_from_slice(&sum.to_be_bytes());
        packet
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IcmpResponse {
    EchoReply { send_time: f64 },
    Unreachable { code: u8 },
    TimeExceeded { code: u8 },
    Unknown { icmp_type: u8, code: u8 },
    Timeout,
}

impl IcmpResponse {
    /// Human readable failure reason, `None` for an echo reply.
    pub fn reason(&self) -> Option<String> {
        match *self {
            IcmpResponse::EchoReply { .. } => None,
            IcmpResponse::Unreachable { code } => Some(lookup_reason(
                &UNREACHABLE_REASONS,
                ICMP_DEST_UNREACHABLE,
                code,
            )),
            IcmpResponse::TimeExceeded { code } => Some(lookup_reason(
                &TIME_EXCEEDED_REASONS,
                ICMP_TIME_EXCEEDED,
                code,
            )),
            IcmpResponse::Unknown { icmp_type, code } => Some(format!(
                "Unknown ICMP type/code: ({}, {})",
                icmp_type, code
            )),
            IcmpResponse::Timeout => Some("Request timed out".to_string()),
        }
    }
}

fn lookup_reason(table: &[&str], icmp_type: u8, code: u8) -> String {
    match table.get(code as usize) {
        Some(reason) => reason.to_string(),
        None => format!("Unknown reason (type {}, code {})", icmp_type, code),
    }
}

/// Result of decoding one inbound datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Not addressed to this probe; keep waiting.
    Foreign,
    Response(IcmpResponse),
}

/// Decodes a raw IPv4 datagram received on an ICMP socket.
///
/// Echo replies must carry both `identifier` and `sequence`. Error messages
/// are matched through the echo request quoted in their payload when it is
/// present, otherwise through the identifier field of their own header.
pub fn decode(datagram: &[u8], identifier: u16, sequence: u16) -> Decoded {
    if datagram.len() < IPV4_HEADER_LEN + ICMP_HEADER_LEN {
        return Decoded::Foreign;
    }
    let icmp = &datagram[IPV4_HEADER_LEN..];
    let icmp_type = icmp[0];
    let code = icmp[1];
    let resp_id = u16::from_be_bytes([icmp[4], icmp[5]]);
    let resp_seq = u16::from_be_bytes([icmp[6], icmp[7]]);

    match icmp_type {
        ICMP_ECHO_REPLY => {
            if resp_id != identifier || resp_seq != sequence {
                return Decoded::Foreign;
            }
            let Some(ts) = icmp.get(ICMP_HEADER_LEN..ECHO_REQUEST_LEN) else {
                return Decoded::Foreign;
            };
            let mut raw = [0u8; TIMESTAMP_LEN];
            raw.copy_from_slice(ts);
            Decoded::Response(IcmpResponse::EchoReply {
                send_time: f64::from_be_bytes(raw),
            })
        }
        // our own request looped back when pinging a local address
        ICMP_ECHO_REQUEST => Decoded::Foreign,
        ICMP_DEST_UNREACHABLE | ICMP_TIME_EXCEEDED => {
            let owned = match quoted_datagram(icmp) {
                Quoted::EchoRequest { id, seq } => id == identifier && seq == sequence,
                Quoted::Other => false,
                Quoted::Truncated => resp_id == identifier,
            };
            if !owned {
                return Decoded::Foreign;
            }
            if icmp_type == ICMP_DEST_UNREACHABLE {
                Decoded::Response(IcmpResponse::Unreachable { code })
            } else {
                Decoded::Response(IcmpResponse::TimeExceeded { code })
            }
        }
        _ => {
            if resp_id != identifier {
                return Decoded::Foreign;
            }
            Decoded::Response(IcmpResponse::Unknown { icmp_type, code })
        }
    }
}

/// What an ICMP error message quotes after its own header.
enum Quoted {
    EchoRequest { id: u16, seq: u16 },
    /// Some other datagram, e.g. UDP; never ours.
    Other,
    /// Too short to tell.
    Truncated,
}

fn quoted_datagram(icmp: &[u8]) -> Quoted {
    let ip_start = ICMP_HEADER_LEN;
    let icmp_start = ip_start + IPV4_HEADER_LEN;
    let Some(quoted) = icmp.get(icmp_start..icmp_start + ICMP_HEADER_LEN) else {
        return Quoted::Truncated;
    };
    if icmp[ip_start + 9] != IPPROTO_ICMP || quoted[0] != ICMP_ECHO_REQUEST {
        return Quoted::Other;
    }
    Quoted::EchoRequest {
        id: u16::from_be_bytes([quoted[4], quoted[5]]),
        seq: u16::from_be_bytes([quoted[6], quoted[7]]),
    }
}
