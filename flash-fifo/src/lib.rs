//! A persistent FIFO of fixed-size sample records over raw NOR flash.
//!
//! Built on [`flash_device::FlashDevice`]. Samples are pushed at the tail
//! and consumed from the head; head and tail positions are tracked with
//! unary bit counters so that advancing either one is a single AND-write,
//! never a read-modify-erase-write cycle. The region never needs an erase
//! to stay consistent except when a counter's sector fills up or when the
//! tail must evict the oldest block of samples to make room.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod fmt;

mod error;
mod fifo;
mod layout;
mod sample;
mod unary;

pub use fifo::{FlashFifo, FlashFifoError, PeekCursor};
pub use layout::FifoLayout;
pub use sample::{Sample, decimals_divisor, ENCODED_LEN};
