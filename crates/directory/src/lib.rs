//! `sn-directory`: one view over owned and shared space nodes.
//!
//! [`SpaceNodeDirectory`] merges the host's managed targets with the
//! spaces the cloud catalog shares with the user, deduplicates them by
//! space id, and pools one refcounted [`sn_session::NodeSession`] per
//! node for every consumer that needs to talk to it.

pub mod catalog;
pub mod directory;
pub mod index;
pub mod pool;

pub use catalog::{AccessStatus, LocalTargets, ManagedTarget, RemoteSpace, RemoteSpaceCatalog, StaticCatalog};
pub use directory::{DirectoryContext, SpaceNodeDirectory, TieBreaker};
