//! Membership client.

use std::net::SocketAddr;
use std::time::Duration;

use chunkmap_core::Member;
use chunkmap_registry::FileMetadata;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::debug;

use crate::codec::{read_frame, write_frame};
use crate::error::TransportError;
use crate::protocol::{Request, Response};

/// A connection to the tracker.
///
/// Calls are sequential: each waits for its response before the next is
/// sent. Every call, and every connect, is bounded by `timeout`.
///
/// Any transport failure (timeout, I/O, closed or garbled stream) drops the
/// connection, since a late reply may still be in flight on it. The next call
/// dials the tracker again. Calls are never retried.
#[derive(Debug)]
pub struct MembershipClient {
    addr: SocketAddr,
    stream: Option<TcpStream>,
    timeout: Duration,
}

impl MembershipClient {
    pub async fn connect(
        addr: impl ToSocketAddrs,
        call_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stream = dial(addr, call_timeout).await?;
        Ok(Self {
            addr: stream.peer_addr()?,
            stream: Some(stream),
            timeout: call_timeout,
        })
    }

    /// Tracker address this client dials.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether a connection is currently open. `false` after a transport
    /// failure, until the next call reconnects.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send a request and wait for its response.
    ///
    /// [`Response::Error`] is turned into [`TransportError::Remote`]; the
    /// connection stays open in that case.
    pub async fn call(&mut self, request: Request) -> Result<Response, TransportError> {
        let op = request.op();
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                debug!(op, addr = %self.addr, "reconnecting");
                dial(self.addr, self.timeout).await?
            }
        };

        let call_timeout = self.timeout;
        let outcome = timeout(call_timeout, exchange(&mut stream, &request))
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(call_timeout)));

        match outcome {
            Ok(response) => {
                self.stream = Some(stream);
                debug!(op, "call completed");
                match response {
                    Response::Error { kind, message } => {
                        Err(TransportError::Remote { kind, message })
                    }
                    other => Ok(other),
                }
            }
            Err(e) => {
                debug!(op, %e, "call failed, dropping connection");
                Err(e)
            }
        }
    }

    /// Register a storage node. Returns the server's message.
    pub async fn register(
        &mut self,
        id: impl Into<String>,
        address: impl Into<String>,
        available_capacity: u64,
    ) -> Result<String, TransportError> {
        let request = Request::Register {
            id: id.into(),
            address: address.into(),
            available_capacity,
        };
        match self.call(request).await? {
            Response::Registered { message, .. } => Ok(message),
            _ => Err(TransportError::UnexpectedResponse("register")),
        }
    }

    pub async fn heartbeat(
        &mut self,
        id: impl Into<String>,
        available_capacity: u64,
        chunk_count: u64,
    ) -> Result<bool, TransportError> {
        let request = Request::Heartbeat {
            id: id.into(),
            available_capacity,
            chunk_count,
        };
        match self.call(request).await? {
            Response::HeartbeatAck { success } => Ok(success),
            _ => Err(TransportError::UnexpectedResponse("heartbeat")),
        }
    }

    /// Members to upload each chunk of a file to, in ordinal order.
    pub async fn upload_nodes(
        &mut self,
        file_id: impl Into<String>,
        chunk_count: u32,
    ) -> Result<Vec<Member>, TransportError> {
        let request = Request::GetUploadNodes {
            file_id: file_id.into(),
            chunk_count,
        };
        match self.call(request).await? {
            Response::UploadNodes { nodes } => Ok(nodes),
            _ => Err(TransportError::UnexpectedResponse("get_upload_nodes")),
        }
    }

    pub async fn get_node(&mut self, id: impl Into<String>) -> Result<Option<Member>, TransportError> {
        match self.call(Request::GetNode { id: id.into() }).await? {
            Response::Node { node } => Ok(node),
            _ => Err(TransportError::UnexpectedResponse("get_node")),
        }
    }

    pub async fn list_nodes(&mut self) -> Result<Vec<Member>, TransportError> {
        match self.call(Request::ListNodes).await? {
            Response::Nodes { nodes } => Ok(nodes),
            _ => Err(TransportError::UnexpectedResponse("list_nodes")),
        }
    }

    pub async fn file_metadata(
        &mut self,
        file_id: impl Into<String>,
    ) -> Result<Option<FileMetadata>, TransportError> {
        let request = Request::GetFileMetadata {
            file_id: file_id.into(),
        };
        match self.call(request).await? {
            Response::FileMetadata { metadata } => Ok(metadata),
            _ => Err(TransportError::UnexpectedResponse("get_file_metadata")),
        }
    }

    /// Members currently holding a recorded file's chunks, in ordinal order.
    pub async fn locate_file(
        &mut self,
        file_id: impl Into<String>,
    ) -> Result<Vec<Member>, TransportError> {
        let request = Request::LocateFile {
            file_id: file_id.into(),
        };
        match self.call(request).await? {
            Response::FileLocation { nodes } => Ok(nodes),
            _ => Err(TransportError::UnexpectedResponse("locate_file")),
        }
    }

    pub async fn deregister(&mut self, id: impl Into<String>) -> Result<Member, TransportError> {
        match self.call(Request::Deregister { id: id.into() }).await? {
            Response::Deregistered { member } => Ok(member),
            _ => Err(TransportError::UnexpectedResponse("deregister")),
        }
    }
}

async fn dial(addr: impl ToSocketAddrs, call_timeout: Duration) -> Result<TcpStream, TransportError> {
    let stream = timeout(call_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Timeout(call_timeout))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

async fn exchange(stream: &mut TcpStream, request: &Request) -> Result<Response, TransportError> {
    write_frame(stream, request).await?;
    read_frame::<_, Response>(stream)
        .await?
        .ok_or(TransportError::ConnectionClosed)
}
