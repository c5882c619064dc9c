//! Tracker-side membership server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chunkmap_registry::NodeRegistry;
use metrics::counter;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::codec::{encode, read_frame};
use crate::error::TransportError;
use crate::protocol::{ErrorKind, Request, Response};

/// Pause after a failed accept, so fd exhaustion doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts membership connections and answers them from a shared registry.
///
/// Every connection gets its own task, so a stalled storage node only ever
/// blocks itself. Registry calls are synchronous and short.
pub struct MembershipServer {
    listener: TcpListener,
    registry: Arc<NodeRegistry>,
}

impl MembershipServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        registry: Arc<NodeRegistry>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to `true` or its sender is
    /// dropped. Open connections are told to stop through the same channel.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        info!(addr = %self.local_addr()?, "membership server listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let registry = Arc::clone(&self.registry);
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, registry, shutdown).await {
                                debug!(%peer, %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(%e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("membership server stopped");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<NodeRegistry>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    debug!(%peer, "connection opened");

    loop {
        let frame = tokio::select! {
            frame = read_frame::<_, Request>(&mut stream) => frame,
            // The channel only ever moves to `true`.
            _ = shutdown.changed() => break,
        };

        let response = match frame {
            Ok(Some(request)) => dispatch(&registry, request),
            Ok(None) => break,
            Err(TransportError::Codec(e)) => {
                warn!(%peer, %e, "undecodable request");
                Response::error(ErrorKind::BadRequest, e.to_string())
            }
            Err(TransportError::FrameTooLarge { len, max }) => {
                // The rest of the stream can't be trusted; answer and hang up.
                let message = format!("frame of {len} bytes exceeds limit of {max}");
                write_response(&mut stream, peer, &Response::error(ErrorKind::BadRequest, message))
                    .await?;
                break;
            }
            Err(e) => return Err(e),
        };

        write_response(&mut stream, peer, &response).await?;
    }

    debug!(%peer, "connection closed");
    Ok(())
}

/// Write one response frame. A response that can't be framed (too large)
/// is replaced by an `Internal` error so the caller still gets an answer.
async fn write_response(
    stream: &mut TcpStream,
    peer: SocketAddr,
    response: &Response,
) -> Result<(), TransportError> {
    let frame = match encode(response) {
        Ok(frame) => frame,
        Err(e) => {
            error!(%peer, %e, "response could not be framed");
            let message = format!("response could not be sent: {e}");
            encode(&Response::error(ErrorKind::Internal, message))?
        }
    };
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

/// Apply one request to the registry.
pub fn dispatch(registry: &NodeRegistry, request: Request) -> Response {
    let op = request.op();
    counter!("chunkmap_requests_total", "op" => op).increment(1);

    let response = match request {
        Request::Register {
            id,
            address,
            available_capacity,
        } => {
            let outcome = registry.register(id, address, available_capacity);
            Response::Registered {
                success: true,
                message: outcome.message().to_string(),
            }
        }
        Request::Heartbeat {
            id,
            available_capacity,
            chunk_count,
        } => match registry.heartbeat(&id, available_capacity, chunk_count) {
            Ok(_) => Response::HeartbeatAck { success: true },
            Err(e) => Response::from(&e),
        },
        Request::GetUploadNodes {
            file_id,
            chunk_count,
        } => match registry.assign_placement(&file_id, chunk_count) {
            Ok(nodes) => Response::UploadNodes { nodes },
            Err(e) => Response::from(&e),
        },
        Request::GetNode { id } => Response::Node {
            node: registry.get_member(&id),
        },
        Request::ListNodes => Response::Nodes {
            nodes: registry.list_members(),
        },
        Request::GetFileMetadata { file_id } => Response::FileMetadata {
            metadata: registry.file_metadata(&file_id),
        },
        Request::LocateFile { file_id } => match registry.locate_file(&file_id) {
            Ok(nodes) => Response::FileLocation { nodes },
            Err(e) => Response::from(&e),
        },
        Request::Deregister { id } => match registry.deregister(&id) {
            Ok(member) => Response::Deregistered { member },
            Err(e) => Response::from(&e),
        },
    };

    if let Response::Error { kind, message } = &response {
        match kind {
            ErrorKind::Internal => error!(op, %message, "request failed"),
            _ => debug!(op, %kind, %message, "request rejected"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkmap_registry::RegistryConfig;

    #[test]
    fn test_dispatch_register_then_list() {
        let registry = NodeRegistry::new(RegistryConfig::default()).unwrap();
        let response = dispatch(
            &registry,
            Request::Register {
                id: "n1".into(),
                address: "localhost:50052".into(),
                available_capacity: 100,
            },
        );
        assert_eq!(
            response,
            Response::Registered {
                success: true,
                message: "node registered successfully".into()
            }
        );

        match dispatch(&registry, Request::ListNodes) {
            Response::Nodes { nodes } => assert_eq!(nodes.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_lenient_unknown_heartbeat() {
        let registry = NodeRegistry::new(RegistryConfig::lenient()).unwrap();
        let response = dispatch(
            &registry,
            Request::Heartbeat {
                id: "unknown-id".into(),
                available_capacity: 1,
                chunk_count: 0,
            },
        );
        assert_eq!(response, Response::HeartbeatAck { success: true });
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_strict_empty_cluster() {
        let registry = NodeRegistry::new(RegistryConfig::default()).unwrap();
        let response = dispatch(
            &registry,
            Request::GetUploadNodes {
                file_id: "file1".into(),
                chunk_count: 4,
            },
        );
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::NoNodesAvailable,
                ..
            }
        ));
    }
}
