//! Logging shim, forwards to `log` or `defmt` depending on feature, compiles
//! to nothing when neither is enabled.

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
