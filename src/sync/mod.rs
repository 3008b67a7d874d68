//! Synchronization primitives for the driver's thread handoff.
//!
//! Register-space exclusion uses `spin::Mutex` directly; the two primitives
//! here are the blocking ones the data paths wait on.

pub mod semaphore;
pub mod signal;

pub use semaphore::Semaphore;
pub use signal::{Signal, Wake};
