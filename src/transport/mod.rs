//! Transport handles consumed by the negotiation drivers.
//!
//! The drivers never open or close a transport; they only move bytes
//! through it. Two call styles are supported:
//!
//! - **Blocking**: [`Transport`], implemented for every `Read + Write`
//!   (e.g. `std::net::TcpStream`).
//! - **Non-blocking**: [`AsyncTransport`], whose operations return boxed
//!   futures that complete when the underlying I/O does.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               Handshake                 │
//! │            (sans-I/O core)              │
//! └──────────────────┬──────────────────────┘
//!                    │
//!          ┌────────┴────────┐
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │    Transport    │ │ AsyncTransport  │
//! │  (Read + Write) │ │ (TcpTransport,  │
//! │                 │ │  Scripted...)   │
//! └─────────────────┘ └─────────────────┘
//! ```
//!
//! Deadlines are a property of the transport, never of the drivers: set
//! them on the `std` socket or through [`TcpTransportConfig`].

mod config;
mod scripted;
mod tcp;

pub use config::TcpTransportConfig;
pub use scripted::ScriptedTransport;
pub use tcp::{connect_blocking, TcpTransport};

use std::future::Future;
use std::io::{self, Read, Write};
use std::pin::Pin;

/// Boxed future returned by [`AsyncTransport`] operations.
pub type IoFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Blocking byte-stream endpoint.
pub trait Transport {
    /// Send bytes, returning how many the transport accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Receive up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: Read + Write + ?Sized> Transport for T {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match self.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result,
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result,
            }
        }
    }
}

/// Non-blocking, connectable byte-stream endpoint.
///
/// Each operation completes through its future; the negotiation driver
/// awaits them strictly in sequence, so implementations never see two
/// operations of the same attempt in flight at once.
pub trait AsyncTransport: Send {
    /// Connect the handle. Must succeed immediately if already connected.
    fn connect(&mut self) -> IoFuture<'_, ()>;

    /// Send bytes, resolving to how many the transport accepted.
    fn send<'a>(&'a mut self, buf: &'a [u8]) -> IoFuture<'a, usize>;

    /// Receive up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn receive<'a>(&'a mut self, buf: &'a mut [u8]) -> IoFuture<'a, usize>;

    /// Receive without suspending.
    ///
    /// Returns `Ok(None)` when no data is immediately available; the driver
    /// then falls back to [`receive`](Self::receive).
    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let _ = buf;
        Ok(None)
    }

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
