//! Resolver error types

use rules_hub_core::CoreError;
use rules_hub_facts::FactError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Localisation lookup failed: {0}")]
    Localisation(String),

    #[error("Asset path resolution failed: {0}")]
    AssetPath(String),

    #[error("Collaborator stream ended without emitting: {0}")]
    EmptyStream(String),

    #[error("Invalid template reply: {0}")]
    InvalidReply(#[from] CoreError),

    #[error(transparent)]
    Fact(#[from] FactError),

    #[error("Resolution task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
