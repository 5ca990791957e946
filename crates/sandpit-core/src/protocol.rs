//! Wire protocol for daemon communication
//!
//! Every message is a 4-byte big-endian length followed by a msgpack body.
//! Bodies are encoded with field names so the tagged enums survive the trip.

use crate::gate::GateStatus;
use crate::result::ExecutionResult;
use crate::screen::ScreeningVerdict;
use crate::{Result, SandpitError};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted in either direction
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Request types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Execute code
    Execute { code: String },
    /// Screen code without running it
    Screen { code: String },
    /// Get gate status
    Status,
    /// Ping
    Ping,
}

/// Response types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Execution result
    Execute { result: ExecutionResult },
    /// Screening verdict
    Screen { verdict: ScreeningVerdict },
    /// Gate status
    Status(GateStatus),
    /// Pong
    Pong,
    /// Error
    Error { message: String },
}

/// Encode a message to msgpack
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(msg)?)
}

/// Decode a message from msgpack
pub fn decode<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(data)?)
}

/// Read one frame. `Ok(None)` means the peer closed the stream cleanly
/// before a new frame started.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(SandpitError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one frame and flush
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8]) -> Result<()> {
    if body.len() > MAX_FRAME_LEN {
        return Err(SandpitError::FrameTooLarge(body.len()));
    }
    let len = u32::try_from(body.len()).map_err(|_| SandpitError::FrameTooLarge(body.len()))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode and send a message
pub async fn send<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    write_frame(writer, &encode(msg)?).await
}

/// Receive and decode a message; `Ok(None)` on clean EOF
pub async fn recv<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    match read_frame(reader).await? {
        Some(body) => Ok(Some(decode(&body)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_response_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        send(&mut client, &Request::Execute { code: "print(1)".into() })
            .await
            .unwrap();
        let req: Request = recv(&mut server).await.unwrap().unwrap();
        assert_eq!(req, Request::Execute { code: "print(1)".into() });

        let resp = Response::Execute {
            result: ExecutionResult::Success { output: "1\n".into() },
        };
        send(&mut server, &resp).await.unwrap();
        let got: Response = recv(&mut client).await.unwrap().unwrap();
        assert_eq!(got, resp);
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let got: Option<Request> = recv(&mut server).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = u32::try_from(MAX_FRAME_LEN + 1).unwrap();
        client.write_all(&len.to_be_bytes()).await.unwrap();

        assert!(matches!(
            read_frame(&mut server).await,
            Err(SandpitError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_status_roundtrip() {
        let resp = Response::Status(GateStatus {
            capacity: 4,
            running: 1,
            queued: 0,
        });
        let back: Response = decode(&encode(&resp).unwrap()).unwrap();
        assert_eq!(back, resp);
    }
}
