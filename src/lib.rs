//! Library crate for arcade-relay, exposing modules for binaries and tests.

pub mod client;
pub mod config;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
pub mod tls;
