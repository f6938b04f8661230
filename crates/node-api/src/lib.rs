//! `sn-node-api`: typed access to a space node's REST API.
//!
//! [`SpaceNodeApi`] describes the calls a device makes against a node it
//! holds a session with; [`NodeApiClient`] implements them by signing
//! each request through a pooled [`sn_session::NodeSession`].

pub mod client;
pub mod provider;

pub use client::NodeApiClient;
pub use provider::SpaceNodeApi;
