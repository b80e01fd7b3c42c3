//! Logging macros.
//!
//! Forward to defmt when the `defmt` feature is on. Otherwise they expand
//! to nothing, but still borrow their arguments so values used only for
//! logging don't trigger unused warnings.

#![allow(unused_macros)]

#[cfg(feature = "defmt")]
#[allow(unused_imports)]
pub(crate) use defmt::{debug, info, trace, warn};

#[cfg(not(feature = "defmt"))]
macro_rules! trace_ {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        let _ = ($( & $x ),*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug_ {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        let _ = ($( & $x ),*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! info_ {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        let _ = ($( & $x ),*);
    }};
}

#[cfg(not(feature = "defmt"))]
macro_rules! warn_ {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        let _ = ($( & $x ),*);
    }};
}

// Renamed on definition: a bare `warn` clashes with the built-in lint attribute
#[cfg(not(feature = "defmt"))]
#[allow(unused_imports)]
pub(crate) use {debug_ as debug, info_ as info, trace_ as trace, warn_ as warn};
