//! `ChronoChat`: chat session layer over named-data fetch and group sync.

pub mod clock;
pub mod config;
pub mod face;
pub mod harness;
pub mod loopback;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod sync;
pub mod timer;
