//! Unix socket server

use sandpit_core::protocol::{self, Request, Response};
use sandpit_core::{Executor, SandpitError};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;

/// Accept connections until the listener fails
pub async fn run(listener: UnixListener, executor: Arc<Executor>) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let executor = Arc::clone(&executor);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, executor).await {
                tracing::error!(error = %e, "connection error");
            }
        });
    }
}

/// Serve sequential requests on one connection until the client hangs up
pub async fn handle_connection<S>(mut stream: S, executor: Arc<Executor>) -> sandpit_core::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let body = match protocol::read_frame(&mut stream).await {
            Ok(Some(body)) => body,
            Ok(None) => break, // Client disconnected
            Err(e @ SandpitError::FrameTooLarge(_)) => {
                // Framing is lost after an oversized length; answer and hang up.
                let response = Response::Error {
                    message: e.to_string(),
                };
                protocol::send(&mut stream, &response).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let response = match protocol::decode::<Request>(&body) {
            Ok(request) => handle_request(request, &executor).await,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request");
                Response::Error {
                    message: e.to_string(),
                }
            }
        };

        protocol::send(&mut stream, &response).await?;
    }

    Ok(())
}

/// Handle a single request
pub async fn handle_request(request: Request, executor: &Executor) -> Response {
    match request {
        Request::Execute { code } => {
            tracing::debug!(code_len = code.len(), "execute request");
            Response::Execute {
                result: executor.execute(&code).await,
            }
        }
        Request::Screen { code } => Response::Screen {
            verdict: executor.screen(&code),
        },
        Request::Status => Response::Status(executor.status()),
        Request::Ping => Response::Pong,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandpit_core::{ExecutionResult, SandboxConfig};

    fn executor(scratch: &std::path::Path) -> Arc<Executor> {
        let config = SandboxConfig::builder()
            .interpreter("/bin/sh")
            .scratch_dir(scratch)
            .scratch_suffix(".sh")
            .timeout_secs(5)
            .build();
        Arc::new(Executor::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        assert_eq!(handle_request(Request::Ping, &executor).await, Response::Pong);
        match handle_request(Request::Status, &executor).await {
            Response::Status(status) => {
                assert_eq!(status.running, 0);
                assert_eq!(status.capacity, executor.config().max_concurrent);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_screen_request() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        match handle_request(Request::Screen { code: "import os".into() }, &executor).await {
            Response::Screen { verdict } => assert!(!verdict.is_safe()),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_serves_multiple_requests() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let (mut client, server) = tokio::io::duplex(64 * 1024);

        let task = tokio::spawn(handle_connection(server, Arc::clone(&executor)));

        protocol::send(&mut client, &Request::Execute { code: "echo hi".into() })
            .await
            .unwrap();
        let resp: Response = protocol::recv(&mut client).await.unwrap().unwrap();
        assert_eq!(
            resp,
            Response::Execute {
                result: ExecutionResult::Success { output: "hi\n".into() }
            }
        );

        protocol::send(&mut client, &Request::Ping).await.unwrap();
        let resp: Response = protocol::recv(&mut client).await.unwrap().unwrap();
        assert_eq!(resp, Response::Pong);

        // Garbage body: answered with an error, connection stays usable
        protocol::write_frame(&mut client, &[0xc1]).await.unwrap();
        let resp: Response = protocol::recv(&mut client).await.unwrap().unwrap();
        assert!(matches!(resp, Response::Error { .. }));

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
