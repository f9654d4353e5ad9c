#![forbid(unsafe_code)]

//! Shared primitives for the hoard workspace: reference counting, lifecycle
//! statuses, completion fan-out, the per-tick busy budget and content hashing.

mod atomic;
mod budget;
mod completion;
mod error;
mod format;
mod hash;
mod path;
mod reference;
mod status;

pub use crate::{
    atomic::write_atomic,
    budget::Budget,
    completion::Completion,
    error::{CoreError, CoreResult},
    format::format_bytes,
    hash::{hash_bytes, hash_file, hash_str},
    path::{join_rel, sanitize_rel},
    reference::Reference,
    status::{LoadStatus, OperationStatus},
};
