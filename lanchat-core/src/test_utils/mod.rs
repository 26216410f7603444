//! Test utilities shared by unit and integration tests
//!
//! A scripted front end that records what the core tells it, a completion guard, and fixtures for
//! loopback sockets.

pub mod async_helpers;
pub mod fixtures;
pub mod recording;

pub use async_helpers::*;
pub use fixtures::*;
pub use recording::*;
