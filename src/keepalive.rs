//! TCP keepalive tuning for accepted connections.
//!
//! Keepalive is switched on and given its idle period through socket2, then
//! the probe count and probe interval are set directly on the descriptor.
//! Every step is best-effort: a failed option is logged and the connection
//! is used anyway.

use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::time::Duration;
use tracing::{debug, error};

/// Keepalive settings applied once, right after a connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveParameters {
    pub enabled: bool,
    /// Idle time before the first probe.
    pub period: Duration,
    /// Unanswered probes before the peer is declared dead.
    pub probe_count: u32,
    /// Seconds between probes.
    pub probe_interval: u32,
}

impl Default for KeepaliveParameters {
    fn default() -> Self {
        Self {
            enabled: true,
            period: Duration::from_secs(30),
            probe_count: 3,
            probe_interval: 3,
        }
    }
}

/// Apply `params` to the socket behind `stream`. Never fails.
pub fn configure<S: AsFd>(stream: &S, params: &KeepaliveParameters) {
    let socket = SockRef::from(stream);

    if !params.enabled {
        if let Err(e) = socket.set_keepalive(false) {
            error!(error = %e, "on disabling keepalive");
        }
        return;
    }

    let keepalive = TcpKeepalive::new().with_time(params.period);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        error!(error = %e, "on enabling keepalive");
    }

    let fd = stream.as_fd().as_raw_fd();

    if let Err(e) = set_tcp_option(fd, libc::TCP_KEEPCNT, params.probe_count) {
        error!(error = %e, "on setting keepalive probe count");
    }

    if let Err(e) = set_tcp_option(fd, libc::TCP_KEEPINTVL, params.probe_interval) {
        error!(error = %e, "on setting keepalive retry interval");
    }

    debug!(
        period_secs = params.period.as_secs(),
        probe_count = params.probe_count,
        probe_interval = params.probe_interval,
        "Keepalive configured"
    );
}

/// Set an integer `IPPROTO_TCP` level option on a raw socket.
fn set_tcp_option(fd: RawFd, option: libc::c_int, value: u32) -> io::Result<()> {
    let value = libc::c_int::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "option value out of range"))?;

    // SAFETY: `fd` is borrowed from a live socket for the duration of the
    // call and `value` outlives it.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            option,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
