//! Fact registry for Rules Hub
//!
//! Owns the set of named, asynchronously updated fact streams. Streams are
//! created lazily on first access and live for the registry's lifetime; a
//! late subscriber immediately replays the latest pushed value before
//! receiving live updates.

pub mod error;
pub mod registry;

pub use error::FactError;
pub use registry::{FactRegistry, FactSubscription};
