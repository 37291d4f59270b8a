//! Runtime adapters: OS signal handling.

pub mod signal;

pub use signal::wait_for_signal;
