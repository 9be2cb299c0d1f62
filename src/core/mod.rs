//! # Core Infrastructure
//!
//! Process-wide building blocks shared by the adapters.

pub mod http_client;
