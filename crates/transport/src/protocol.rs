//! Membership protocol messages.
//!
//! Every request gets exactly one response on the same connection. Failures
//! the registry reports come back as [`Response::Error`] with a machine
//! readable [`ErrorKind`].

use std::fmt;

use chunkmap_core::Member;
use chunkmap_registry::{FileMetadata, RegistryError};
use serde::{Deserialize, Serialize};

/// Calls made by storage nodes and clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Sent once by a storage node at startup.
    Register {
        id: String,
        address: String,
        available_capacity: u64,
    },
    /// Sent periodically by a storage node.
    Heartbeat {
        id: String,
        available_capacity: u64,
        chunk_count: u64,
    },
    /// Placement for a new upload, one member per chunk. Recorded as the
    /// file's chunk index.
    GetUploadNodes { file_id: String, chunk_count: u32 },
    GetNode { id: String },
    ListNodes,
    GetFileMetadata { file_id: String },
    /// Current records of the members holding a recorded file's chunks.
    LocateFile { file_id: String },
    Deregister { id: String },
}

impl Request {
    /// Operation name, used for logs and metrics labels.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::Heartbeat { .. } => "heartbeat",
            Request::GetUploadNodes { .. } => "get_upload_nodes",
            Request::GetNode { .. } => "get_node",
            Request::ListNodes => "list_nodes",
            Request::GetFileMetadata { .. } => "get_file_metadata",
            Request::LocateFile { .. } => "locate_file",
            Request::Deregister { .. } => "deregister",
        }
    }
}

/// Answers from the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Registered { success: bool, message: String },
    HeartbeatAck { success: bool },
    UploadNodes { nodes: Vec<Member> },
    Node { node: Option<Member> },
    Nodes { nodes: Vec<Member> },
    FileMetadata { metadata: Option<FileMetadata> },
    FileLocation { nodes: Vec<Member> },
    Deregistered { member: Member },
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }
}

impl From<&RegistryError> for Response {
    fn from(err: &RegistryError) -> Self {
        Response::error(ErrorKind::from(err), err.to_string())
    }
}

/// Failure categories carried over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownMember,
    UnknownFile,
    NoNodesAvailable,
    StaleAssignment,
    /// The request could not be decoded or is out of bounds.
    BadRequest,
    Internal,
}

impl From<&RegistryError> for ErrorKind {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::UnknownMember(_) => ErrorKind::UnknownMember,
            RegistryError::UnknownFile(_) => ErrorKind::UnknownFile,
            RegistryError::NoNodesAvailable => ErrorKind::NoNodesAvailable,
            RegistryError::StaleAssignment { .. } => ErrorKind::StaleAssignment,
            RegistryError::TooManyChunks { .. } => ErrorKind::BadRequest,
            RegistryError::Config(_) => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnknownMember => "unknown member",
            ErrorKind::UnknownFile => "unknown file",
            ErrorKind::NoNodesAvailable => "no nodes available",
            ErrorKind::StaleAssignment => "stale assignment",
            ErrorKind::BadRequest => "bad request",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}
