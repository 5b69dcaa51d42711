//! Tracing setup shared by the pingkeeper binaries.

mod subscriber;

pub use subscriber::{init, init_with_level};
