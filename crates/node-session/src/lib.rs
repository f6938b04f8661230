//! `sn-session`: authenticated sessions with space nodes.
//!
//! A session bootstraps a short-lived symmetric key from the device's and
//! the node's long-lived RSA identities (RSA-OAEP carrying an X25519
//! exchange), keeps it fresh in the background, and signs every request
//! with it. [`NodeResponder`] is the matching node side.

pub mod crypto;
pub mod identity;
pub mod refresh;
pub mod responder;
pub mod session;
pub mod signing;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use identity::{DeviceIdentity, DeviceKeys, StaticDeviceIdentity};
pub use responder::{NodeResponder, VerifiedCaller};
pub use session::{AuthState, NodeSession, SessionOptions};
pub use transport::{
    HttpConnector, HttpNodeTransport, NodeConnector, NodeRequest, NodeResponse, NodeTransport,
};
