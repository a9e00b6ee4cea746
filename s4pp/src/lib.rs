//! S4PP: a small text-based, HMAC-authenticated batched upload protocol for
//! time-series samples, paired with a `no_std` session driver.
//!
//! Samples come from anything implementing [`SampleSource`] — most often a
//! [`flash_fifo::FlashFifo`]'s peek cursor via [`source::FifoSource`] — and
//! are streamed to a server over anything implementing
//! [`s4pp_transport::Transport`]. [`session::run_upload`] drives one session
//! end to end: hello, HMAC authentication against a server-issued token,
//! batching samples into sequences under a payload limit, and reporting how
//! many samples were acknowledged. Up to two built sequences may sit on the
//! transport awaiting a reply at once; replies are still matched to
//! sequences one at a time, oldest first, so a `NOK` always identifies a
//! single outstanding sequence.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod fmt;

mod buffer;
mod dictionary;
mod engine;
mod error;
mod hex;
mod hmac;
mod render;
mod session;
mod source;

pub use error::S4ppError;
pub use session::{run_upload, Credentials, State, UploadOptions, UploadReport};
pub use source::{FifoSource, SampleSource, SliceSource, UploadSample};
