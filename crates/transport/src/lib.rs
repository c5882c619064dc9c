//! Membership RPC over TCP.
//!
//! This crate exposes the registry to the rest of the cluster:
//! - Request/response protocol
//! - Length-prefixed frame codec
//! - The tracker-side server
//! - A client used by storage nodes and uploaders

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::MembershipClient;
pub use error::TransportError;
pub use protocol::{ErrorKind, Request, Response};
pub use server::MembershipServer;
