//! Wire types shared by the relay, its HTTP surface, and the client layer.

pub mod common;
pub mod health;
pub mod phase;
pub mod validation;
pub mod ws;
