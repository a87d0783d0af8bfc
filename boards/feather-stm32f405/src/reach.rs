#![deny(unsafe_code)]
#![deny(warnings)]
//! Internet reachability probe: DNS lookup plus a bare TCP handshake

use defmt::{debug, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Stack};
use embassy_time::Duration;
use hal_abstractions::{Reachability, ReachabilityError};

/// The probe sends nothing, so the socket buffers stay tiny
const PROBE_BUF_LEN: usize = 64;

pub struct StackReach {
    stack: Stack<'static>,
    timeout: Duration,
}

impl StackReach {
    pub fn new(stack: Stack<'static>, timeout_ms: u32) -> Self {
        Self {
            stack,
            timeout: Duration::from_millis(timeout_ms as u64),
        }
    }
}

impl Reachability for StackReach {
    type Address = IpAddress;

    async fn resolve_host(&mut self, host: &str) -> Result<IpAddress, ReachabilityError> {
        let address = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|_| ReachabilityError::DnsFailed)?
            .first()
            .copied()
            .ok_or(ReachabilityError::DnsFailed)?;
        debug!("Resolved {} to {}", host, Debug2Format(&address));
        Ok(address)
    }

    async fn tcp_probe(&mut self, address: IpAddress, port: u16) -> Result<(), ReachabilityError> {
        let mut rx_buffer = [0u8; PROBE_BUF_LEN];
        let mut tx_buffer = [0u8; PROBE_BUF_LEN];
        let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(self.timeout));

        let result = socket
            .connect((address, port))
            .await
            .map_err(|_| ReachabilityError::ConnectFailed);
        socket.abort();
        let _ = socket.flush().await;
        result
    }
}
