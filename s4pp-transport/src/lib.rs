//! The byte-stream transport the S4PP engine is driven over.
//!
//! This crate defines only the trait and an in-memory test fake; the
//! concrete TLS/TCP socket implementation is supplied by whoever embeds the
//! protocol engine, exactly as the original firmware treats its socket layer
//! as an external collaborator.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod fmt;

#[cfg(any(test, feature = "std"))]
pub mod mock;

pub use embedded_io_async::{Error as IoError, ErrorKind, ErrorType, Read, Write};

/// A connectable, disconnectable byte stream.
///
/// `Read`/`Write` carry the actual data transfer; `connect`/`disconnect`
/// bracket a session the way opening and closing a TCP/TLS socket would.
/// Implementors decide what `secure` and `port` mean (a plain `Transport`
/// impl wrapping a TCP socket vs. one wrapping a TLS session over it).
pub trait Transport: Read + Write {
    /// Establish the underlying connection. Calling `connect` on an
    /// already-connected transport is implementation-defined (the mock
    /// treats it as a no-op).
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Tear down the connection. Safe to call more than once.
    async fn disconnect(&mut self) -> Result<(), Self::Error>;
}

/// Read exactly `buf.len()` bytes, handling partial reads from `reader`.
pub async fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), R::Error> {
    let mut offset = 0;
    while offset < buf.len() {
        let n = reader.read(&mut buf[offset..]).await?;
        if n == 0 {
            break;
        }
        offset += n;
    }
    Ok(())
}

/// Write all of `buf`, handling partial writes to `writer`.
pub async fn write_all<W: Write>(writer: &mut W, buf: &[u8]) -> Result<(), W::Error> {
    let mut offset = 0;
    while offset < buf.len() {
        let n = writer.write(&buf[offset..]).await?;
        if n == 0 {
            break;
        }
        offset += n;
    }
    Ok(())
}
