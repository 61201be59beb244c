//! In-memory transport replaying a scripted proxy.
//!
//! Inbound data is queued as chunks, each standing for one network arrival.
//! A receive never crosses a chunk boundary, so splitting a response into
//! chunks reproduces short reads. Once a chunk has been partly read, the
//! rest of it counts as immediately available for
//! [`AsyncTransport::try_receive`]; a fresh chunk always needs a suspending
//! [`AsyncTransport::receive`].

use std::collections::VecDeque;
use std::future;
use std::io::{self, Read, Write};

use super::{AsyncTransport, IoFuture};

/// Scripted peer for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    inbound: VecDeque<Vec<u8>>,
    partial: bool,
    written: Vec<u8>,
    send_limit: Option<usize>,
    connect_error: Option<io::ErrorKind>,
    receive_error: Option<io::ErrorKind>,
    connected: bool,
    connects: usize,
    sends: usize,
    receives: usize,
    suspended_receives: usize,
}

impl ScriptedTransport {
    /// Transport with nothing to deliver; reads report an orderly close.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport delivering `chunks` in order.
    pub fn with_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut transport = Self::new();
        for chunk in chunks {
            transport = transport.with_chunk(chunk);
        }
        transport
    }

    /// Queue one more inbound chunk.
    pub fn with_chunk(mut self, chunk: impl AsRef<[u8]>) -> Self {
        let chunk = chunk.as_ref();
        if !chunk.is_empty() {
            self.inbound.push_back(chunk.to_vec());
        }
        self
    }

    /// Accept at most `limit` bytes per send.
    pub fn with_send_limit(mut self, limit: usize) -> Self {
        self.send_limit = Some(limit);
        self
    }

    /// Fail every connect with `kind`.
    pub fn failing_connect(mut self, kind: io::ErrorKind) -> Self {
        self.connect_error = Some(kind);
        self
    }

    /// Fail receives with `kind` once the inbound chunks run out.
    pub fn failing_receive(mut self, kind: io::ErrorKind) -> Self {
        self.receive_error = Some(kind);
        self
    }

    /// Everything sent so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Inbound bytes not yet received.
    pub fn remaining(&self) -> Vec<u8> {
        self.inbound.iter().flatten().copied().collect()
    }

    /// Check if connect succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connect attempts.
    pub fn connects(&self) -> usize {
        self.connects
    }

    /// Send calls.
    pub fn sends(&self) -> usize {
        self.sends
    }

    /// Receive calls, suspending or not.
    pub fn receives(&self) -> usize {
        self.receives
    }

    /// Receives that went through the suspending path.
    pub fn suspended_receives(&self) -> usize {
        self.suspended_receives
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.receives += 1;

        let Some(front) = self.inbound.front_mut() else {
            return match self.receive_error {
                Some(kind) => Err(io::Error::new(kind, "scripted receive failure")),
                None => Ok(0),
            };
        };

        let n = buf.len().min(front.len());
        buf[..n].copy_from_slice(&front[..n]);
        front.drain(..n);
        if front.is_empty() {
            self.inbound.pop_front();
            self.partial = false;
        } else {
            self.partial = n > 0;
        }
        Ok(n)
    }

    fn write_chunk(&mut self, buf: &[u8]) -> usize {
        self.sends += 1;
        let n = self.send_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.written.extend_from_slice(&buf[..n]);
        n
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf)
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_chunk(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsyncTransport for ScriptedTransport {
    fn connect(&mut self) -> IoFuture<'_, ()> {
        self.connects += 1;
        let result = match self.connect_error {
            Some(kind) => Err(io::Error::new(kind, "scripted connect failure")),
            None => {
                self.connected = true;
                Ok(())
            },
        };
        Box::pin(future::ready(result))
    }

    fn send<'a>(&'a mut self, buf: &'a [u8]) -> IoFuture<'a, usize> {
        Box::pin(future::ready(Ok(self.write_chunk(buf))))
    }

    fn receive<'a>(&'a mut self, buf: &'a mut [u8]) -> IoFuture<'a, usize> {
        self.suspended_receives += 1;
        Box::pin(future::ready(self.read_chunk(buf)))
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        if !self.partial {
            return Ok(None);
        }
        self.read_chunk(buf).map(Some)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
