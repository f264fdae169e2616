use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Resolves the first address for `addr`. The punch protocol targets exactly
/// one remote endpoint per run.
pub fn resolve_first<T: std::net::ToSocketAddrs>(addr: T) -> Result<SocketAddr, anyhow::Error> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::Error::msg("Bad socket addr"))
}

fn get_udp_socket_builder(domain: Domain) -> Result<Socket, anyhow::Error> {
    Ok(socket2::Socket::new(
        domain,
        Type::DGRAM,
        Some(Protocol::UDP),
    )?)
}

fn setup_base_socket(addr: SocketAddr, socket: &Socket) -> Result<(), anyhow::Error> {
    socket.set_nonblocking(true)?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    Ok(())
}

fn setup_bind(addr: SocketAddr, socket: &Socket) -> Result<(), anyhow::Error> {
    setup_base_socket(addr, socket)?;
    socket.bind(&SockAddr::from(addr))?;

    Ok(())
}

/// Builds a non-blocking UDP socket bound to `addr`. Failure to bind (port in
/// use, permission denied) is fatal to the punch run that requested it.
pub fn get_udp_socket<T: std::net::ToSocketAddrs>(addr: T) -> Result<UdpSocket, anyhow::Error> {
    let addr = resolve_first(addr)?;
    log::trace!(target: "pinhole", "[Socket helper] Getting UDP socket @ {:?} ...", &addr);
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = get_udp_socket_builder(domain)?;
    setup_bind(addr, &socket)?;

    Ok(tokio::net::UdpSocket::from_std(socket.into())?)
}
