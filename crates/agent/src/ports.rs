//! Reachability checks for the masternode's public ports.

use mnwatch_types::PortState;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

/// Try a TCP connection to `addr` (`host:port`).
///
/// `OPEN` when any resolved address accepts within `timeout`, `CLOSED` when
/// none does. `None` when the address does not resolve.
pub fn check_port(addr: &str, timeout: Duration) -> Option<PortState> {
    let candidates: Vec<_> = match addr.to_socket_addrs() {
        Ok(resolved) => resolved.collect(),
        Err(e) => {
            warn!(%addr, error = %e, "Failed to resolve port address");
            return None;
        }
    };
    if candidates.is_empty() {
        warn!(%addr, "Port address resolved to nothing");
        return None;
    }

    for candidate in &candidates {
        match TcpStream::connect_timeout(candidate, timeout) {
            Ok(_) => return Some(PortState::Open),
            Err(e) => debug!(%candidate, error = %e, "Port connect failed"),
        }
    }
    Some(PortState::Closed)
}
