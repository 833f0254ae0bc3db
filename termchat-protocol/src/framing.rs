use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::envelope::Envelope;
use crate::error::{FrameError, ProtocolError};
use crate::MAX_FRAME_SIZE;

const MAX_VARINT_LEN: usize = 10;
const READ_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult<T> {
    Complete(T),
    Incomplete,
}

/// `varint(len) || json`. The length prefix lets a reader pull exactly one record off
/// the stream regardless of how the bytes were chunked in transit.
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
    let body = envelope.to_json()?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(body.len()));
    }
    let mut buf = BytesMut::with_capacity(body.len() + MAX_VARINT_LEN);
    prost::encoding::encode_varint(body.len() as u64, &mut buf);
    buf.extend_from_slice(&body);
    Ok(buf.to_vec())
}

pub fn decode_frame(buf: &mut BytesMut) -> Result<DecodeResult<Envelope>, ProtocolError> {
    if buf.is_empty() {
        return Ok(DecodeResult::Incomplete);
    }

    let mut peek = &buf[..];
    let len = match prost::encoding::decode_varint(&mut peek) {
        Ok(len) => len as usize,
        Err(_) => {
            if buf.len() < MAX_VARINT_LEN {
                return Ok(DecodeResult::Incomplete);
            }
            return Err(ProtocolError::InvalidFrameHeader);
        },
    };

    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let varint_len = buf.len() - peek.len();
    let total_len = varint_len + len;

    if buf.len() < total_len {
        return Ok(DecodeResult::Incomplete);
    }

    buf.advance(varint_len);
    let frame_data = buf.split_to(len);
    let envelope = Envelope::from_json(&frame_data[..])?;
    Ok(DecodeResult::Complete(envelope))
}

pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let encoded = encode_frame(envelope)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Pulls whole envelopes off a byte stream.
///
/// `read_envelope` is cancel safe: partial input stays buffered in the reader, so it
/// can sit in a `tokio::select!` next to a shutdown signal.
pub struct FrameReader<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::new(),
        }
    }

    /// Next envelope, or `None` once the peer has closed the stream on a frame
    /// boundary.
    pub async fn read_envelope(&mut self) -> Result<Option<Envelope>, FrameError> {
        loop {
            if let DecodeResult::Complete(envelope) = decode_frame(&mut self.buffer)? {
                return Ok(Some(envelope));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated(self.buffer.len()));
            }
            log::trace!("read {} bytes, {} buffered", n, self.buffer.len() + n);
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}
