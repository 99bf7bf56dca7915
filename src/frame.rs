//! Length-prefixed frame transport (spec §4.2).
//!
//! Wire shape: an 8-byte big-endian length `N`, followed by exactly `N`
//! bytes of (already-encrypted) payload. `N == 0` is the graceful-close
//! sentinel. Mirrors `original_source/src/luxdb/connection.py`'s
//! `send_obj`/`receive_obj` (async) and `send_obj_sync`/`receive_obj_sync`
//! (blocking) pair, one frame per call in both directions.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransportError;

const LEN_BYTES: usize = 8;

/// Sends one frame: the length prefix then the payload, flushed before
/// returning. An empty `payload` sends the close sentinel.
pub async fn send_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    writer.write_all(&(payload.len() as u64).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Sends the zero-length close sentinel.
pub async fn send_close<W: AsyncWriteExt + Unpin>(writer: &mut W) -> Result<(), TransportError> {
    send_frame(writer, &[]).await
}

/// Receives one frame. `Ok(None)` means the peer sent the close sentinel.
/// A connection that closes mid-frame is a `TransportError::Protocol`.
pub async fn recv_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut len_bytes = [0u8; LEN_BYTES];
    match reader.read_exact(&mut len_bytes).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u64::from_be_bytes(len_bytes) as usize;
    if len == 0 {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Protocol("connection closed mid-frame".into())
        } else {
            TransportError::Io(e)
        }
    })?;

    Ok(Some(payload))
}

/// Blocking variants of the above, used by the synchronous client and the
/// synchronous client tests; identical wire format.
pub mod sync {
    use std::io::{Read, Write};

    use crate::error::TransportError;

    const LEN_BYTES: usize = 8;

    pub fn send_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError> {
        writer.write_all(&(payload.len() as u64).to_be_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;
        Ok(())
    }

    pub fn send_close<W: Write>(writer: &mut W) -> Result<(), TransportError> {
        send_frame(writer, &[])
    }

    pub fn recv_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError> {
        let mut len_bytes = [0u8; LEN_BYTES];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u64::from_be_bytes(len_bytes) as usize;
        if len == 0 {
            return Ok(None);
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::Protocol("connection closed mid-frame".into())
            } else {
                TransportError::Io(e)
            }
        })?;

        Ok(Some(payload))
    }
}
