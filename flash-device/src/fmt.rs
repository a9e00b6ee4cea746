//! Logging shim: forwards to `log` or `defmt` depending on which feature is
//! enabled, and compiles to nothing when neither is. Mirrors the shim every
//! other crate in this workspace uses, so callers can mix and match without
//! caring which backend a given dependency picked.

#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::trace!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::trace!($($arg)*);
        }
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::debug!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::debug!($($arg)*);
        }
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::warn!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::warn!($($arg)*);
        }
    };
}

macro_rules! error {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::error!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::error!($($arg)*);
        }
    };
}

pub(crate) use debug;
pub(crate) use error;
pub(crate) use trace;
pub(crate) use warn;
