//! Shared wire vocabulary for `ChronoChat`: names, packets and chat payloads.

pub mod codec;
pub mod message;
pub mod name;
pub mod packet;
