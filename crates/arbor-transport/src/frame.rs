//! Length-delimited frame codec
//!
//! A frame is a 4-byte big-endian length prefix followed by a
//! postcard-encoded record body. The same codec carries all three record
//! kinds (bare ID, contact record, message envelope); the link layer knows
//! from its handshake state which type to expect next.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

/// Maximum frame body size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode a record together with its length prefix.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Bytes, WireError> {
    let body = postcard::to_allocvec(value).map_err(|e| WireError::Encode(e.to_string()))?;

    if body.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let len = body.len() as u32;
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&body);

    Ok(Bytes::from(framed))
}

/// Write one framed record to a stream.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let framed = encode_frame(value)?;
    writer
        .write_all(&framed)
        .await
        .map_err(WireError::link_broken)?;
    Ok(())
}

/// Read one framed record from a stream.
///
/// EOF mid-frame (or before the prefix) surfaces as
/// [`WireError::LinkBroken`]; a link has no clean close in this protocol.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, WireError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    reader
        .read_exact(&mut prefix)
        .await
        .map_err(WireError::link_broken)?;

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(WireError::link_broken)?;

    postcard::from_bytes(&body).map_err(|e| WireError::Decode(e.to_string()))
}
