//! Listener construction: `SO_REUSEADDR`, optional `SO_REUSEPORT`, and
//! `TCP_NODELAY` on accepted connections.
//!
//! Ported from `net_create_listener` in `socket.c`. `socket2` is used
//! here (not merely carried over unused, as in the teacher crate) because
//! `SO_REUSEPORT` has no equivalent in `std::net` or in `tokio::net`'s
//! builder — it has to be set on the raw socket before binding.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

/// Build one listening socket bound to `0.0.0.0:port`.
///
/// `reuse_port` should be `true` whenever more than one worker thread
/// will bind the same port — the kernel then load-balances accepted
/// connections across every listener sharing the option, which is how
/// this crate's worker pool avoids a single shared accept queue.
pub(crate) fn create_listener(port: u16, backlog: i32, reuse_port: bool) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    if reuse_port {
        socket.set_reuse_port(true)?;
    }

    let addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into();
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    TcpListener::from_std(socket.into())
}

/// Disable Nagle's algorithm on a freshly accepted connection, matching
/// the reference implementation's per-connection `TCP_NODELAY` call in
/// `handle_accept`.
pub(crate) fn set_nodelay(stream: &tokio::net::TcpStream) -> io::Result<()> {
    stream.set_nodelay(true)
}
