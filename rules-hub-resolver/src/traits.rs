//! Injected collaborator interfaces

use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use tokio_stream::{Stream, StreamExt};

use crate::ResolverError;

/// Stream of string emissions from a collaborator; only the first is used
pub type StringStream = Pin<Box<dyn Stream<Item = Result<String, ResolverError>> + Send>>;

/// Localization lookup collaborator
pub trait LocalisationService: Send + Sync {
    /// Translate a key, substituting the given fact-valued parameters
    fn translate(&self, key: &str, params: HashMap<String, Value>) -> StringStream;
}

/// Asset-path rewriting collaborator
pub trait AssetPathService: Send + Sync {
    /// Rewrite a relative asset path to its served location
    fn resolve_path(&self, relative_path: &str) -> StringStream;
}

/// Await the first emission of a collaborator stream
pub(crate) async fn first_emission(
    mut stream: StringStream,
    context: &str,
) -> Result<String, ResolverError> {
    match stream.next().await {
        Some(result) => result,
        None => Err(ResolverError::EmptyStream(context.to_string())),
    }
}
