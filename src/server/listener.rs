//! Accept loop for the HTTP listener
//!
//! Every connection runs in a task owned by the loop's `JoinSet`, so the
//! loop controls connection lifetime:
//! - stop request: stop accepting, ask each connection to finish its
//!   in-flight request, then wait for all of them
//! - loop task aborted: the `JoinSet` is dropped and every remaining
//!   connection is closed at once

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Source of inbound connections for the accept loop
///
/// `TcpListener` in production; tests script accept failures with their own.
pub(crate) trait Acceptor: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Serve `router` on `listener` until `stop` fires
///
/// Returns `Ok(())` after a requested stop has drained every connection, or
/// the first accept error that is not a per-connection failure.
pub(crate) async fn serve<A: Acceptor>(
    mut listener: A,
    router: Router,
    mut stop: oneshot::Receiver<()>,
) -> io::Result<()> {
    let (close_tx, close_rx) = watch::channel(false);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) if is_connection_error(&e) => {
                        debug!(error = %e, "Connection failed during accept");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                debug!(peer = %peer, "Connection accepted");
                connections.spawn(serve_connection(stream, peer, router.clone(), close_rx.clone()));
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    let _ = close_tx.send(true);
    info!(open_connections = connections.len(), "Listener closed, draining connections");

    while connections.join_next().await.is_some() {}
    Ok(())
}

async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    router: Router,
    mut close: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = TowerToHyperService::new(router);
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        // Either a close request or the loop going away; both mean drain.
        _ = close.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}

/// Errors that only affect the connection being accepted
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Acceptor that fails with the scripted errors, then waits forever
    struct ScriptedAcceptor {
        errors: VecDeque<io::Error>,
    }

    impl ScriptedAcceptor {
        fn failing_with(kinds: &[io::ErrorKind]) -> Self {
            Self {
                errors: kinds.iter().map(|kind| io::Error::from(*kind)).collect(),
            }
        }
    }

    impl Acceptor for ScriptedAcceptor {
        type Stream = TcpStream;

        fn accept(
            &mut self,
        ) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
            let next = self.errors.pop_front();
            async move {
                match next {
                    Some(e) => Err(e),
                    None => std::future::pending().await,
                }
            }
        }
    }

    #[test]
    fn test_per_connection_errors_are_not_fatal() {
        for kind in [
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
        ] {
            assert!(is_connection_error(&io::Error::from(kind)));
        }
    }

    #[test]
    fn test_other_accept_errors_are_fatal() {
        assert!(!is_connection_error(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
        assert!(!is_connection_error(&io::Error::other("too many open files")));
    }

    #[tokio::test]
    async fn test_serve_returns_fatal_accept_error() {
        let acceptor = ScriptedAcceptor::failing_with(&[
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::PermissionDenied,
        ]);
        let (_stop_tx, stop_rx) = oneshot::channel();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            serve(acceptor, Router::new(), stop_rx),
        )
        .await
        .expect("accept loop should end on a fatal error");

        let err = result.expect_err("fatal accept error should be returned");
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_serve_keeps_running_after_connection_errors() {
        let acceptor = ScriptedAcceptor::failing_with(&[io::ErrorKind::ConnectionReset]);
        let (stop_tx, stop_rx) = oneshot::channel();
        let server = tokio::spawn(serve(acceptor, Router::new(), stop_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished(), "connection errors must not end the loop");

        stop_tx.send(()).expect("accept loop gone");
        let result = tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .expect("accept loop should stop when asked")
            .expect("accept loop panicked");
        assert!(result.is_ok());
    }
}
