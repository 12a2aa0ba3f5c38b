use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use super::packet::{decode, Decoded, EchoRequest, IcmpResponse};
use super::ProbeOutcome;
use crate::timestamp::epoch_seconds;

const RECV_BUF_LEN: usize = 1024;

/// Datagram transport the probe executor sends and receives ICMP through.
pub trait IcmpTransport {
    async fn send_to(&mut self, packet: &[u8], destination: Ipv4Addr) -> io::Result<()>;

    /// Receives one raw IPv4 datagram, IP header included.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// `SOCK_RAW` / `IPPROTO_ICMP` socket registered with the tokio reactor.
/// Closed on drop.
pub struct RawIcmpSocket {
    inner: AsyncFd<Socket>,
}

impl RawIcmpSocket {
    pub fn open() -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .context("failed to create raw ICMP socket (root or CAP_NET_RAW required)")?;
        socket.set_nonblocking(true)?;
        let inner = AsyncFd::new(socket).context("failed to register ICMP socket")?;
        Ok(Self { inner })
    }
}

impl IcmpTransport for RawIcmpSocket {
    async fn send_to(&mut self, packet: &[u8], destination: Ipv4Addr) -> io::Result<()> {
        let addr = SockAddr::from(SocketAddrV4::new(destination, 0));
        loop {
            let mut guard = self.inner.writable().await?;
            match guard.try_io(|inner| inner.get_ref().send_to(packet, &addr)) {
                Ok(result) => return result.map(|_| ()),
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| {
                let mut socket = inner.get_ref();
                socket.read(buf)
            }) {
                Ok(result) => return result,
                Err(_would_block) => continue,
            }
        }
    }
}

/// Sends one echo request and waits up to `timeout` for its outcome.
///
/// Datagrams that belong to someone else are skipped and the wait resumes
/// with whatever is left of the budget. A reply that only arrives once the
/// budget is spent counts as a timeout.
pub async fn send_and_await<T: IcmpTransport>(
    transport: &mut T,
    destination: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    timeout: Duration,
) -> ProbeOutcome {
    let request = EchoRequest::new(identifier, sequence, epoch_seconds());
    if let Err(e) = transport.send_to(&request.encode(), destination).await {
        warn!("send to {} failed: {}", destination, e);
        return ProbeOutcome::Failure { reason: format!("Send failed: {}", e) };
    }
    debug!(%destination, identifier, sequence, "echo request sent");

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; RECV_BUF_LEN];
    loop {
        let len = match timeout_at(deadline, transport.recv(&mut buf)).await {
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                warn!("receive from {} failed: {}", destination, e);
                return ProbeOutcome::Failure { reason: format!("Receive failed: {}", e) };
            }
            Err(_elapsed) => return failure(&IcmpResponse::Timeout),
        };
        let received_at = epoch_seconds();

        match decode(&buf[..len], identifier, sequence) {
            Decoded::Foreign => {
                trace!(len, "discarding datagram for another probe");
            }
            Decoded::Response(IcmpResponse::EchoReply { send_time }) => {
                if Instant::now() >= deadline {
                    return failure(&IcmpResponse::Timeout);
                }
                return ProbeOutcome::Success { rtt: received_at - send_time };
            }
            Decoded::Response(response) => return failure(&response),
        }
    }
}

fn failure(response: &IcmpResponse) -> ProbeOutcome {
    ProbeOutcome::Failure {
        reason: response.reason().unwrap_or_default(),
    }
}
