#![macro_use]
#![allow(unused_macros)]

//! Logging front-end
//!
//! Forwards to `defmt` or `log` depending on the enabled feature. Format
//! strings must stay within the subset both accept (`{}` and `{:?}`).

macro_rules! log_forward {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::$level!($s $(, $x)*);
            #[cfg(all(feature = "log", not(feature = "defmt")))]
            ::log::$level!($s $(, $x)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ($( & $x, )*);
        }
    };
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => { log_forward!(trace, $s $(, $x)*) };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => { log_forward!(debug, $s $(, $x)*) };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => { log_forward!(info, $s $(, $x)*) };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => { log_forward!(warn, $s $(, $x)*) };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => { log_forward!(error, $s $(, $x)*) };
}
