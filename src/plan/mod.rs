//! Command-line resolution
//!
//! A [`validation::ValidationPlan`] is compiled once from a command tree. Tokens are then
//! matched against it to produce an [`execution::ExecutionPlan`], which records matched
//! commands with their options as well as unknown commands and options.

pub mod execution;
pub mod validation;

pub use execution::{ExecutionPlan, PlanItem};
pub use validation::{PlanError, ValidationPlan};
