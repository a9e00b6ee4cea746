//! In-memory duplex [`Transport`] fake for tests.
//!
//! [`Loopback::pair`] hands back a client half (the thing under test drives)
//! and a [`LoopbackServer`] half a test uses to play the role of the S4PP
//! server: inspect what the client sent, queue up canned responses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::vec::Vec;

use crate::Transport;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

/// The only way a [`Loopback`] can fail: it was disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackClosed;

impl core::fmt::Display for LoopbackClosed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("loopback transport is disconnected")
    }
}

impl core::error::Error for LoopbackClosed {}

impl embedded_io_async::Error for LoopbackClosed {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NotConnected
    }
}

#[derive(Default)]
struct Pipe(Mutex<VecDeque<u8>>);

impl Pipe {
    fn push(&self, bytes: &[u8]) {
        self.0.lock().unwrap().extend(bytes.iter().copied());
    }

    fn try_take(&self, buf: &mut [u8]) -> usize {
        let mut queue = self.0.lock().unwrap();
        let n = buf.len().min(queue.len());
        for slot in buf[..n].iter_mut() {
            *slot = queue.pop_front().unwrap();
        }
        n
    }

    fn drain_all(&self) -> Vec<u8> {
        self.0.lock().unwrap().drain(..).collect()
    }
}

/// The client half of an in-memory transport pair.
pub struct Loopback {
    outbound: Arc<Pipe>,
    inbound: Arc<Pipe>,
    closed: Arc<AtomicBool>,
    connected: bool,
}

/// The server half: write canned responses, inspect what the client sent.
pub struct LoopbackServer {
    outbound: Arc<Pipe>,
    inbound: Arc<Pipe>,
    closed: Arc<AtomicBool>,
}

impl Loopback {
    /// Build a connected client/server pair.
    pub fn pair() -> (Self, LoopbackServer) {
        let client_to_server = Arc::new(Pipe::default());
        let server_to_client = Arc::new(Pipe::default());
        let closed = Arc::new(AtomicBool::new(false));
        let client = Self {
            outbound: client_to_server.clone(),
            inbound: server_to_client.clone(),
            closed: closed.clone(),
            connected: true,
        };
        let server = LoopbackServer {
            outbound: server_to_client,
            inbound: client_to_server,
            closed,
        };
        (client, server)
    }
}

impl LoopbackServer {
    /// Queue bytes the client's next `read` calls will see.
    pub fn send(&self, bytes: &[u8]) {
        self.outbound.push(bytes);
    }

    /// Drain and return everything the client has written so far.
    pub fn take_sent(&self) -> Vec<u8> {
        self.inbound.drain_all()
    }

    /// Simulate the server half of a TCP connection going away: once
    /// queued bytes are drained, the client's `read` sees EOF (`Ok(0)`)
    /// instead of blocking forever.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ErrorType for Loopback {
    type Error = LoopbackClosed;
}

impl Read for Loopback {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(LoopbackClosed);
        }
        loop {
            let n = self.inbound.try_take(buf);
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Ok(0);
            }
            tokio::task::yield_now().await;
        }
    }
}

impl Write for Loopback {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if !self.connected {
            return Err(LoopbackClosed);
        }
        self.outbound.push(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Transport for Loopback {
    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.connected = false;
        Ok(())
    }
}
