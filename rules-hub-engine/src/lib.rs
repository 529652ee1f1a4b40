//! Rule evaluation and action dispatch for Rules Hub
//!
//! The engine re-evaluates the rules affected by a fact change against
//! read-only fact snapshots and hands the resulting action batch to the
//! dispatcher, which fans it out to the capable registered handlers.

pub mod dispatcher;
pub mod engine;

pub use dispatcher::ActionDispatcher;
pub use engine::{RuleEngine, RuleOutcome, RuleState};
