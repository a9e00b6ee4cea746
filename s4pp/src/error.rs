//! The session-level error taxonomy (spec's error kinds, minus Flash, which
//! surfaces as [`flash_fifo::FlashFifoError`] from the FIFO layer directly).
//!
//! Hand-written rather than built with `flash_fifo`'s `define_error!`: that
//! macro assumes exactly one wrapped external error type (`Flash(E)`), but a
//! session has two independent ones — the transport's and the sample
//! source's — so the generated `From` impl wouldn't be unambiguous.

use core::fmt;

/// Why an upload session ended without completing.
#[derive(Debug)]
#[non_exhaustive]
pub enum S4ppError<T, S> {
    /// Missing user, key, or server in the session configuration.
    Config(&'static str),
    /// The payload buffer could not hold the next line.
    Allocation,
    /// `connect`/`send`/`disconnect` failed on the transport.
    Transport(T),
    /// Unexpected line, missing newline, or a malformed hello.
    Protocol(&'static str),
    /// The server replied `NOK`/`REJ` for the outstanding sequence.
    CommitRejected,
    /// The sample source produced a sample missing a required field, or
    /// failed outright.
    Iterator(S),
}

impl<T: fmt::Display, S: fmt::Display> fmt::Display for S4ppError<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Allocation => write!(f, "payload buffer allocation failed"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::CommitRejected => write!(f, "commit rejected by server"),
            Self::Iterator(e) => write!(f, "sample source error: {e}"),
        }
    }
}

impl<T: fmt::Debug + fmt::Display, S: fmt::Debug + fmt::Display> core::error::Error
    for S4ppError<T, S>
{
}
