//! Unix socket client for the daemon

use crate::gate::GateStatus;
use crate::protocol::{self, Request, Response};
use crate::result::ExecutionResult;
use crate::screen::ScreeningVerdict;
use crate::{Result, SandpitError};
use std::path::Path;
use tokio::net::UnixStream;

/// One connection to a running daemon. Requests are answered in order.
#[derive(Debug)]
pub struct Client {
    stream: UnixStream,
}

impl Client {
    pub async fn connect(socket: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(socket.as_ref()).await?;
        Ok(Self { stream })
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        protocol::send(&mut self.stream, request).await?;
        protocol::recv(&mut self.stream)
            .await?
            .ok_or_else(|| SandpitError::Protocol("daemon closed the connection".into()))
    }

    pub async fn execute(&mut self, code: impl Into<String>) -> Result<ExecutionResult> {
        match self.request(&Request::Execute { code: code.into() }).await? {
            Response::Execute { result } => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn screen(&mut self, code: impl Into<String>) -> Result<ScreeningVerdict> {
        match self.request(&Request::Screen { code: code.into() }).await? {
            Response::Screen { verdict } => Ok(verdict),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn status(&mut self) -> Result<GateStatus> {
        match self.request(&Request::Status).await? {
            Response::Status(status) => Ok(status),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.request(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> SandpitError {
    match response {
        Response::Error { message } => SandpitError::Protocol(message.clone()),
        other => SandpitError::Protocol(format!("unexpected response: {other:?}")),
    }
}
