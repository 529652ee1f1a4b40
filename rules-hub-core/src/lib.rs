//! Core domain models for Rules Hub
//!
//! This crate contains the shared data structures used across
//! the engine: Action, Rule, VariableDescriptor, TemplateReply and
//! the rendered placeholder entities, plus the ActionHandler trait.

pub mod error;
pub mod handler;
pub mod models;

pub use error::CoreError;
pub use handler::ActionHandler;
pub use models::*;
