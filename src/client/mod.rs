//! Browser-side game logic that consumes the relay's broadcasts.
//!
//! None of this runs in the server binary. It holds the parts of the client that
//! carry protocol semantics: avatar smoothing, Pong host physics, the cabinet
//! mirror and the outbound move batcher.

pub mod batching;
pub mod cabinet;
pub mod interpolation;
pub mod pong;
