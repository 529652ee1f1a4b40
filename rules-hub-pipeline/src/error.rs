//! Pipeline and store error types

use rules_hub_resolver::ResolverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Template fetch failed: {0}")]
    Fetch(anyhow::Error),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
