//! Fact registry error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactError {
    #[error("Fact stream closed: {0}")]
    Closed(String),
}
