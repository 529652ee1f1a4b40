//! Placeholder content pipeline for Rules Hub
//!
//! Orchestrates the end-to-end placeholder flow: await a fetched template
//! reply, resolve it, and publish the rendered entity keyed by request id.
//! A newer trigger for the same id supersedes any in-flight resolution
//! (last-trigger-wins).

pub mod error;
pub mod memory;
pub mod pipeline;
pub mod traits;

pub use error::{PipelineError, StoreError};
pub use memory::InMemoryPlaceholderStore;
pub use pipeline::{PlaceholderContentPipeline, PlaceholderTrigger};
pub use traits::PlaceholderStore;
