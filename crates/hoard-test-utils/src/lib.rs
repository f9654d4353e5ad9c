#![forbid(unsafe_code)]
#![expect(
    clippy::unwrap_used,
    reason = "test utility crate, unwraps are acceptable"
)]

//! Shared test utilities for the hoard workspace.

pub mod build;
pub mod fixtures;
pub mod http_server;

pub use build::{PackageFixture, manifest, package, write_build};
pub use fixtures::*;
pub use http_server::{FileServer, LoggedRequest, RequestLog, TestHttpServer};
