//! Length-delimited message framing over an async byte stream.

use crate::varint::{put_varint, MAX_FRAME_LEN, MAX_VARINT_LEN};
use atvremote_core::error::{Result, WireError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Prefix `payload` with its varint length and write the whole frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(payload.len()).into());
    }

    let mut frame = Vec::with_capacity(payload.len() + 2);
    put_varint(&mut frame, payload.len() as u64);
    frame.extend_from_slice(payload);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message: a varint length followed by that many bytes.
///
/// The length is read byte-by-byte so no more than one frame is ever pulled
/// off the stream, and lengths beyond the sanity bound are rejected before
/// any allocation.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut len: u64 = 0;
    for i in 0..MAX_VARINT_LEN {
        let byte = reader.read_u8().await?;
        len |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            break;
        }
        if i == MAX_VARINT_LEN - 1 {
            return Err(WireError::VarintOverflow.into());
        }
    }

    let len = len as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len).into());
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atvremote_core::Error;
    use std::io::Cursor;

    #[tokio::test]
    async fn frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        assert_eq!(buf[0], 5);

        let mut cursor = Cursor::new(buf);
        let payload = read_frame(&mut cursor).await.unwrap();
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn consecutive_frames_stay_separate() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"one").await.unwrap();
        write_frame(&mut buf, b"two").await.unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"one");
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn multibyte_length_prefix() {
        let payload = vec![0xabu8; 300];
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).await.unwrap();
        assert_eq!(&buf[..2], &[0xac, 0x02]);

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 1_000_000);
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::Wire(WireError::FrameTooLarge(_))));
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_on_write() {
        let payload = vec![0u8; MAX_FRAME_LEN + 1];
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &payload).await.unwrap_err();
        assert!(matches!(err, Error::Wire(WireError::FrameTooLarge(_))));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn truncated_payload_is_an_io_error() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 10);
        buf.extend_from_slice(b"short");
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
