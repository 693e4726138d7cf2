//! Definitions of commands and tasks
//!
//! Commands and tasks share one representation, [`definition::Definition`], stored in an
//! arena ([`registry::Registry`]) and addressed by [`registry::UnitId`]. Commands are
//! additionally placed in a [`tree::CommandTree`] that gives them their command-line
//! names; tasks are only reachable as dependencies.

pub mod definition;
pub mod option;
pub mod registry;
pub mod tree;
