//! # Socket de Escucha
//! src/server/listener.rs
//!
//! El master crea el socket una sola vez; todos los workers lo heredan con
//! `fork()`. Lleva un timeout de recepción para que un `accept()` bloqueado
//! vuelva periódicamente y el worker pueda revisar el flag de terminación.
//!
//! Con SO_RCVTIMEO el kernel nunca reinicia un `accept()` interrumpido por
//! una señal; [`accept`] entrega ese EINTR en vez de reintentar.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Crea, configura y pone a escuchar el socket
pub fn bind(address: &str, backlog: i32, accept_timeout: Duration) -> io::Result<TcpListener> {
    let addr: SocketAddr = address.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("address '{}' did not resolve", address),
        )
    })?;

    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    // SO_RCVTIMEO sobre el socket de escucha acota la espera de accept()
    socket.set_read_timeout(Some(accept_timeout))?;

    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

/// Acepta una conexión sin reintentar ante EINTR
///
/// `TcpListener::accept` reintenta en silencio; aquí un `Interrupted`
/// llega al llamador.
pub fn accept(listener: &TcpListener) -> io::Result<(TcpStream, SocketAddr)> {
    let (socket, addr) = SockRef::from(listener).accept()?;
    let peer = addr.as_socket().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "peer is not an inet address")
    })?;
    Ok((socket.into(), peer))
}

/// `true` para los errores de `accept()` que solo significan "no hubo conexión"
pub fn is_accept_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
