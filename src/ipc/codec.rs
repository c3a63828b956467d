//! Length-prefixed JSON frame codec.
//!
//! Every envelope travels as one frame:
//!
//! ```text
//! bytes[0..4]     payload length L, unsigned big-endian
//! bytes[4]        delimiter b':'
//! bytes[5..5+L]   JSON-encoded envelope
//! ```
//!
//! Use [`FrameCodec`] with [`tokio_util::codec::Framed`] for streams, or
//! [`encode_frame`] / [`decode_frame`] for complete byte buffers.
//!
//! The declared length is checked against the configured maximum before
//! any buffer space is reserved for the payload, on both the sending and
//! the receiving side.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::DEFAULT_MAX_FRAME_LENGTH;
use crate::models::Envelope;
use crate::{AppError, Result};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Fixed byte separating the length prefix from the payload.
pub const DELIMITER: u8 = b':';

/// Bytes preceding the payload in every frame.
pub const HEADER_LEN: usize = LENGTH_PREFIX_LEN + 1;

/// Codec turning a byte stream into [`Envelope`]s and back.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_length: usize,
}

impl FrameCodec {
    /// Codec rejecting payloads longer than `max_frame_length` bytes.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }

    /// Largest payload this codec accepts or produces.
    #[must_use]
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl Decoder for FrameCodec {
    type Item = Envelope;
    type Error = AppError;

    /// Decode the next complete frame from `src`.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let declared = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if declared > self.max_frame_length {
            return Err(AppError::Framing(format!(
                "declared frame length {declared} exceeds maximum {}",
                self.max_frame_length
            )));
        }

        let total = HEADER_LEN + declared;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        if src[LENGTH_PREFIX_LEN] != DELIMITER {
            return Err(AppError::Framing(format!(
                "expected delimiter {DELIMITER:#04x}, found {:#04x}",
                src[LENGTH_PREFIX_LEN]
            )));
        }

        let frame = src.split_to(total);
        serde_json::from_slice(&frame[HEADER_LEN..])
            .map(Some)
            .map_err(|err| AppError::Decode(format!("malformed envelope: {err}")))
    }

    /// Decode the final frame once the stream has ended.
    ///
    /// A clean end between frames yields `Ok(None)`; leftover bytes mean the
    /// peer went away mid-frame and yield a framing error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Envelope>> {
        if let Some(envelope) = self.decode(src)? {
            return Ok(Some(envelope));
        }
        if src.is_empty() {
            return Ok(None);
        }
        Err(truncated(src))
    }
}

impl Encoder<Envelope> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<()> {
        write_frame(&item, self.max_frame_length, dst)
    }
}

/// Encode `envelope` as one complete frame.
///
/// # Errors
///
/// Returns `AppError::Encode` if the envelope cannot be serialized and
/// `AppError::Framing` if the payload exceeds `max_frame_length`.
pub fn encode_frame(envelope: &Envelope, max_frame_length: usize) -> Result<Vec<u8>> {
    let mut dst = BytesMut::new();
    write_frame(envelope, max_frame_length, &mut dst)?;
    Ok(dst.to_vec())
}

/// Decode exactly one frame from `frame`.
///
/// # Errors
///
/// Returns `AppError::Framing` if the buffer is shorter than the frame it
/// declares, longer than one frame, carries the wrong delimiter, or declares
/// more than `max_frame_length` bytes; `AppError::Decode` if the payload is
/// not a valid envelope.
pub fn decode_frame(frame: &[u8], max_frame_length: usize) -> Result<Envelope> {
    let mut src = BytesMut::from(frame);
    let mut codec = FrameCodec::new(max_frame_length);
    match codec.decode_eof(&mut src)? {
        Some(envelope) if src.is_empty() => Ok(envelope),
        Some(_) => Err(AppError::Framing(format!(
            "{} trailing bytes after frame",
            src.len()
        ))),
        None => Err(AppError::Framing("empty input: no length prefix".into())),
    }
}

fn write_frame(envelope: &Envelope, max_frame_length: usize, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(envelope)
        .map_err(|err| AppError::Encode(format!("failed to serialize envelope: {err}")))?;

    if payload.len() > max_frame_length {
        return Err(AppError::Framing(format!(
            "frame length {} exceeds maximum {max_frame_length}",
            payload.len()
        )));
    }
    let length = u32::try_from(payload.len()).map_err(|_| {
        AppError::Framing(format!(
            "frame length {} does not fit the length prefix",
            payload.len()
        ))
    })?;

    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(length);
    dst.put_u8(DELIMITER);
    dst.extend_from_slice(&payload);
    Ok(())
}

fn truncated(src: &BytesMut) -> AppError {
    if src.len() < LENGTH_PREFIX_LEN {
        return AppError::Framing(format!(
            "stream closed after {} of {LENGTH_PREFIX_LEN} length-prefix bytes",
            src.len()
        ));
    }
    let declared = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    AppError::Framing(format!(
        "stream closed after {} of {} frame bytes",
        src.len(),
        HEADER_LEN + declared
    ))
}
