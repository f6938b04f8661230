//! `sn-domain`: shared types for the space-node client crates.
//!
//! Holds the error taxonomy, construction-time configuration, structured
//! trace events, subscriber setup, and the [`SpaceNodeRef`] node model
//! that both the session and directory crates operate on.

pub mod config;
pub mod error;
pub mod logging;
pub mod space;
pub mod trace;

pub use error::{Error, Result};
pub use space::{NodeDescriptor, NodeStatus, Provenance, SpaceNodeRef};
