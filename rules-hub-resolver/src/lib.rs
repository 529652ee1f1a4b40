//! Placeholder template resolution for Rules Hub
//!
//! Resolves the typed variables of a template reply (literals, rewritten
//! asset paths, fact snapshots, localised strings with fact parameters)
//! concurrently and substitutes them into the template text. Collaborators
//! are injected as explicit trait objects.

pub mod error;
pub mod resolver;
pub mod traits;

pub use error::ResolverError;
pub use resolver::TemplateResolver;
pub use traits::{AssetPathService, LocalisationService, StringStream};
