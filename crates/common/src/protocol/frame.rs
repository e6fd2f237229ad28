use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the big-endian length prefix in front of every frame
pub const FRAME_HEADER_SIZE: usize = 4;
/// Largest handshake frame a peer will accept
pub const MAX_HANDSHAKE_FRAME: usize = 128 * 1024;
/// Largest transfer payload frame a peer will accept
pub const MAX_PAYLOAD_FRAME: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },
    /// The stream ended part way through a frame
    #[error("stream ended mid-frame")]
    Truncated,
    /// The stream ended cleanly before any byte of the frame
    #[error("stream closed")]
    Closed,
}

/// Write `bytes` as a single `u32_be len | bytes` frame
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(bytes.len()).map_err(|_| FrameError::TooLarge {
        len: bytes.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a single frame written by [`write_frame`]
///
/// The length prefix is checked against `max` before anything is allocated.
pub async fn read_frame<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                FrameError::Closed
            } else {
                FrameError::Truncated
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;
    Ok(body)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            write_frame(&mut a, b"hello").await.unwrap();
            write_frame(&mut a, b"").await.unwrap();
        });
        assert_eq!(read_frame(&mut b, 16).await.unwrap(), b"hello");
        assert!(read_frame(&mut b, 16).await.unwrap().is_empty());
        writer.await.unwrap();
        assert!(matches!(read_frame(&mut b, 16).await, Err(FrameError::Closed)));
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let mut input: &[u8] = &[0, 0, 1, 0, 1, 2, 3];
        assert!(matches!(
            read_frame(&mut input, 255).await,
            Err(FrameError::TooLarge { len: 256, max: 255 })
        ));
    }

    #[tokio::test]
    async fn test_frame_truncated() {
        let mut short_header: &[u8] = &[0, 0];
        assert!(matches!(
            read_frame(&mut short_header, 16).await,
            Err(FrameError::Truncated)
        ));

        let mut short_body: &[u8] = &[0, 0, 0, 5, 1, 2];
        assert!(matches!(
            read_frame(&mut short_body, 16).await,
            Err(FrameError::Truncated)
        ));
    }
}
