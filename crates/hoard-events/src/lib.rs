#![forbid(unsafe_code)]

//! Unified event bus for the hoard runtime.

mod bus;
mod download;
mod event;
mod load;
mod manifest;

pub use bus::{EventBus, Subscription};
pub use download::DownloadEvent;
pub use event::{Event, Topic};
pub use load::{LoadEvent, OperationEvent};
pub use manifest::ManifestEvent;
