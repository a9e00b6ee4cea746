/// Defines an error enum with a mandatory `Flash(E)` variant wrapping the
/// underlying [`flash_device::FlashDevice::Error`], plus whatever
/// additional variants the module needs, along with `From`, `Display`, and
/// `core::error::Error` impls. Mirrors the shape of adapter-error macros
/// used elsewhere in this kind of block-device stack, specialized to the
/// "wraps a flash error" case instead of "wraps an I/O error".
macro_rules! define_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident<$err:ident> {
            $(#[$flash_meta:meta])*
            Flash($flash_ty:ident) => $flash_msg:literal,
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $({ $($field:ident : $field_ty:ty),* $(,)? })? => $variant_msg:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[non_exhaustive]
        $vis enum $name<$err> {
            $(#[$flash_meta])*
            Flash($flash_ty),
            $(
                $(#[$variant_meta])*
                $variant $({ $($field : $field_ty),* })?,
            )+
        }

        impl<$err> From<$err> for $name<$err> {
            fn from(e: $err) -> Self {
                Self::Flash(e)
            }
        }

        impl<$err: core::fmt::Display> core::fmt::Display for $name<$err> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    Self::Flash(e) => write!(f, $flash_msg, e),
                    $(
                        Self::$variant $({ $($field),* })? => write!(f, $variant_msg $(, $($field),*)?),
                    )+
                }
            }
        }

        impl<$err: core::fmt::Debug + core::fmt::Display> core::error::Error for $name<$err> {}
    };
}

pub(crate) use define_error;
