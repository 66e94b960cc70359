//! Macros for coordination error handling.
//!
//! Provides convenience macros for creating and returning [`crate::error::CoordError`]
//! instances with reduced boilerplate.

/// Creates a [`crate::error::CoordError`] from error kind, description and an optional dynamic
/// detail.
///
/// A source error is attached afterwards with [`crate::error::CoordError::with_source`].
#[macro_export]
macro_rules! coord_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::CoordError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::CoordError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::CoordError`] from the current function.
///
/// Supports the same optional detail argument as [`coord_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::coord_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::coord_error!($kind, $desc, $detail))
    };
}
