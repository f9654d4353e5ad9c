//! All integration tests for hoard
#![expect(
    clippy::unwrap_used,
    reason = "integration test crate, unwraps are acceptable in test code"
)]

mod common;
mod hoard_runtime;
