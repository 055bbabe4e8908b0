//! Wire messages for the streaming annotation session.
//!
//! One duplex channel, two independent directions:
//! request direction carries `Config`, `Content`, `WritesDone`;
//! response direction carries `Result` and a terminal `Status`.

use anyhow::{Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wire format: all multi-byte integers are big-endian
/// Strings are length-prefixed (u16 len + UTF-8)
/// Frame format: len:u32 | type:u8 | payload

/// Maximum content chunk size: 1 MiB
pub const CONTENT_CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum frame size (2 MiB) - prevents OOM from malicious/corrupted frames
pub const MAX_FRAME_SIZE: u32 = 2 * 1024 * 1024;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Config = 0x01,
    Content = 0x02,
    WritesDone = 0x03,
    Result = 0x10,
    Status = 0x11,
}

impl MessageType {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Config),
            0x02 => Some(Self::Content),
            0x03 => Some(Self::WritesDone),
            0x10 => Some(Self::Result),
            0x11 => Some(Self::Status),
            _ => None,
        }
    }
}

// =============================================================================
// Feature selector
// =============================================================================

/// Processing mode requested from the remote annotation service.
/// Negotiated once in the config message; needed later to interpret results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum StreamingFeature {
    LabelDetection = 1,
    ShotChangeDetection = 2,
    ExplicitContentDetection = 3,
    ObjectTracking = 4,
}

impl StreamingFeature {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::LabelDetection),
            2 => Some(Self::ShotChangeDetection),
            3 => Some(Self::ExplicitContentDetection),
            4 => Some(Self::ObjectTracking),
            _ => None,
        }
    }
}

// =============================================================================
// Status Codes
// =============================================================================

/// Terminal channel status, reported by the remote in the `Status` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    Internal = 13,
    Unavailable = 14,
}

impl StatusCode {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::Cancelled),
            3 => Some(Self::InvalidArgument),
            4 => Some(Self::DeadlineExceeded),
            13 => Some(Self::Internal),
            14 => Some(Self::Unavailable),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

// =============================================================================
// Config Flags
// =============================================================================

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigFlags: u8 {
        const STATIONARY_CAMERA = 1 << 0;
    }
}

// =============================================================================
// Result Flags
// =============================================================================

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ResultFlags: u8 {
        const HAS_ERROR = 1 << 0;
    }
}

// =============================================================================
// CONFIG (0x01)
// =============================================================================

/// The single configuration message. Must be the first frame on the channel.
#[derive(Debug, Clone)]
pub struct ConfigRequest {
    pub feature: StreamingFeature,
    pub flags: ConfigFlags,
    pub model: String,
}

impl ConfigRequest {
    pub fn encode(&self) -> Bytes {
        let model_bytes = self.model.as_bytes();
        let payload_len = 2 + 1 + 2 + model_bytes.len();

        let mut buf = BytesMut::with_capacity(5 + payload_len);
        buf.put_u32(payload_len as u32);
        buf.put_u8(MessageType::Config as u8);
        buf.put_u16(self.feature as u16);
        buf.put_u8(self.flags.bits());
        buf.put_u16(model_bytes.len() as u16);
        buf.put_slice(model_bytes);

        buf.freeze()
    }

    pub fn decode(mut payload: Bytes) -> Result<Self> {
        if payload.remaining() < 5 {
            anyhow::bail!("Config payload too short");
        }
        let feature_raw = payload.get_u16();
        let feature =
            StreamingFeature::from_u16(feature_raw).context("Unknown feature selector in Config")?;
        let flags = ConfigFlags::from_bits_truncate(payload.get_u8());
        let model_len = payload.get_u16() as usize;
        if payload.remaining() < model_len {
            anyhow::bail!("Config model truncated");
        }
        let model = String::from_utf8(payload.copy_to_bytes(model_len).to_vec())
            .context("Invalid UTF-8 in Config model")?;

        Ok(Self {
            feature,
            flags,
            model,
        })
    }
}

// =============================================================================
// CONTENT (0x02)
// =============================================================================

/// One opaque content chunk, at most [`CONTENT_CHUNK_SIZE`] bytes.
/// The frame payload is the raw chunk.
#[derive(Debug, Clone)]
pub struct Content {
    pub data: Bytes,
}

impl Content {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.data.len());
        buf.put_u32(self.data.len() as u32);
        buf.put_u8(MessageType::Content as u8);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    pub fn decode(payload: Bytes) -> Result<Self> {
        if payload.len() > CONTENT_CHUNK_SIZE {
            anyhow::bail!(
                "Content chunk of {} bytes exceeds maximum {}",
                payload.len(),
                CONTENT_CHUNK_SIZE
            );
        }
        Ok(Self { data: payload })
    }
}

// =============================================================================
// WRITES_DONE (0x03)
// =============================================================================

/// Explicit half-close of the send direction. Sent exactly once, after the
/// last content chunk or after a send failure.
#[derive(Debug, Clone, Copy)]
pub struct WritesDone;

impl WritesDone {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u32(0);
        buf.put_u8(MessageType::WritesDone as u8);
        buf.freeze()
    }
}

// =============================================================================
// RESULT (0x10)
// =============================================================================

/// In-band error carried on the result stream. Does not terminate the
/// session; only channel closure does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultError {
    pub code: u16,
    pub message: String,
}

/// One annotation result: either a successful (partial or complete) payload
/// or an in-band error descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateResult {
    pub error: Option<ResultError>,
    pub payload: Bytes,
}

impl AnnotateResult {
    pub fn ok(payload: impl Into<Bytes>) -> Self {
        Self {
            error: None,
            payload: payload.into(),
        }
    }

    pub fn err(code: u16, message: impl Into<String>) -> Self {
        Self {
            error: Some(ResultError {
                code,
                message: message.into(),
            }),
            payload: Bytes::new(),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Encode the frame payload only. This is also the record persisted by
    /// the result mirror, length-delimited.
    pub fn encode_payload(&self) -> Bytes {
        let mut flags = ResultFlags::empty();
        let mut payload_len = 1 + 4 + self.payload.len();
        if let Some(err) = &self.error {
            flags |= ResultFlags::HAS_ERROR;
            payload_len += 2 + 2 + err.message.len();
        }

        let mut buf = BytesMut::with_capacity(payload_len);
        buf.put_u8(flags.bits());
        if let Some(err) = &self.error {
            let msg_bytes = err.message.as_bytes();
            buf.put_u16(err.code);
            buf.put_u16(msg_bytes.len() as u16);
            buf.put_slice(msg_bytes);
        }
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);

        buf.freeze()
    }

    pub fn encode(&self) -> Bytes {
        let payload = self.encode_payload();
        let mut buf = BytesMut::with_capacity(5 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_u8(MessageType::Result as u8);
        buf.put_slice(&payload);
        buf.freeze()
    }

    pub fn decode(mut payload: Bytes) -> Result<Self> {
        if payload.remaining() < 1 {
            anyhow::bail!("Result payload too short");
        }
        let flags = ResultFlags::from_bits_truncate(payload.get_u8());

        let error = if flags.contains(ResultFlags::HAS_ERROR) {
            if payload.remaining() < 4 {
                anyhow::bail!("Result error descriptor truncated");
            }
            let code = payload.get_u16();
            let msg_len = payload.get_u16() as usize;
            if payload.remaining() < msg_len {
                anyhow::bail!("Result error message truncated");
            }
            let message = String::from_utf8(payload.copy_to_bytes(msg_len).to_vec())
                .context("Invalid UTF-8 in Result error message")?;
            Some(ResultError { code, message })
        } else {
            None
        };

        if payload.remaining() < 4 {
            anyhow::bail!("Result payload length truncated");
        }
        let data_len = payload.get_u32() as usize;
        if payload.remaining() < data_len {
            anyhow::bail!("Result annotation payload truncated");
        }
        let data = payload.copy_to_bytes(data_len);

        Ok(Self {
            error,
            payload: data,
        })
    }
}

// =============================================================================
// STATUS (0x11)
// =============================================================================

/// Terminal channel status, sent by the remote before closing its direction.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let msg_bytes = self.message.as_bytes();
        let payload_len = 2 + 2 + msg_bytes.len();

        let mut buf = BytesMut::with_capacity(5 + payload_len);
        buf.put_u32(payload_len as u32);
        buf.put_u8(MessageType::Status as u8);
        buf.put_u16(self.code as u16);
        buf.put_u16(msg_bytes.len() as u16);
        buf.put_slice(msg_bytes);

        buf.freeze()
    }

    pub fn decode(mut payload: Bytes) -> Result<Self> {
        if payload.remaining() < 4 {
            anyhow::bail!("Status payload too short");
        }
        let code_raw = payload.get_u16();
        let code = StatusCode::from_u16(code_raw)
            .with_context(|| format!("Unknown status code {}", code_raw))?;
        let msg_len = payload.get_u16() as usize;
        if payload.remaining() < msg_len {
            anyhow::bail!("Status message truncated");
        }
        let message = String::from_utf8(payload.copy_to_bytes(msg_len).to_vec())
            .context("Invalid UTF-8 in Status message")?;

        Ok(Self { code, message })
    }
}

// =============================================================================
// Frame reading/writing
// =============================================================================

/// Read a single frame from the stream.
/// Returns (message_type, payload).
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<(MessageType, Bytes)> {
    let len = r.read_u32().await.context("Failed to read frame length")?;

    // Validate frame size before allocation
    if len > MAX_FRAME_SIZE {
        anyhow::bail!(
            "Frame size {} exceeds maximum allowed size {}",
            len,
            MAX_FRAME_SIZE
        );
    }

    let msg_type = r.read_u8().await.context("Failed to read message type")?;
    let msg_type = MessageType::from_u8(msg_type).context("Unknown message type")?;

    let payload_len = len as usize;
    let mut payload = vec![0u8; payload_len];
    r.read_exact(&mut payload)
        .await
        .context("Failed to read frame payload")?;

    Ok((msg_type, Bytes::from(payload)))
}

/// Write a pre-encoded frame to the stream.
pub async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, frame: &Bytes) -> Result<()> {
    w.write_all(frame).await.context("Failed to write frame")?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let config = ConfigRequest {
            feature: StreamingFeature::LabelDetection,
            flags: ConfigFlags::STATIONARY_CAMERA,
            model: "builtin/stable".to_string(),
        };
        let encoded = config.encode();

        // Skip frame header (4 bytes len + 1 byte type)
        let payload = Bytes::copy_from_slice(&encoded[5..]);
        let decoded = ConfigRequest::decode(payload).unwrap();

        assert_eq!(decoded.feature, StreamingFeature::LabelDetection);
        assert!(decoded.flags.contains(ConfigFlags::STATIONARY_CAMERA));
        assert_eq!(decoded.model, "builtin/stable");
    }

    #[test]
    fn test_config_rejects_unknown_feature() {
        let mut buf = BytesMut::new();
        buf.put_u16(99);
        buf.put_u8(0);
        buf.put_u16(0);
        assert!(ConfigRequest::decode(buf.freeze()).is_err());
    }

    #[test]
    fn test_content_roundtrip() {
        let content = Content {
            data: Bytes::from(vec![1, 2, 3, 4, 5]),
        };
        let encoded = content.encode();
        let payload = Bytes::copy_from_slice(&encoded[5..]);
        let decoded = Content::decode(payload).unwrap();

        assert_eq!(decoded.data.as_ref(), &[1, 2, 3, 4, 5]);
        assert_eq!(encoded[4], MessageType::Content as u8);
    }

    #[test]
    fn test_content_rejects_oversized_chunk() {
        let payload = Bytes::from(vec![0u8; CONTENT_CHUNK_SIZE + 1]);
        assert!(Content::decode(payload).is_err());
    }

    #[test]
    fn test_writes_done_is_empty_frame() {
        let encoded = WritesDone.encode();
        assert_eq!(encoded.len(), 5);
        assert_eq!(&encoded[0..4], &[0, 0, 0, 0]);
        assert_eq!(encoded[4], MessageType::WritesDone as u8);
    }

    #[test]
    fn test_result_roundtrip_ok() {
        let result = AnnotateResult::ok(Bytes::from("label:dog 0.93"));
        let encoded = result.encode();
        let payload = Bytes::copy_from_slice(&encoded[5..]);
        let decoded = AnnotateResult::decode(payload).unwrap();

        assert!(!decoded.is_err());
        assert_eq!(decoded.payload.as_ref(), b"label:dog 0.93");
    }

    #[test]
    fn test_result_roundtrip_error() {
        let result = AnnotateResult::err(3, "unsupported codec");
        let encoded = result.encode();
        let payload = Bytes::copy_from_slice(&encoded[5..]);
        let decoded = AnnotateResult::decode(payload).unwrap();

        let err = decoded.error.expect("expected in-band error");
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "unsupported codec");
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_status_roundtrip() {
        let status = Status {
            code: StatusCode::Internal,
            message: "annotation backend crashed".to_string(),
        };
        let encoded = status.encode();
        let payload = Bytes::copy_from_slice(&encoded[5..]);
        let decoded = Status::decode(payload).unwrap();

        assert_eq!(decoded.code, StatusCode::Internal);
        assert_eq!(decoded.message, "annotation backend crashed");
        assert!(!decoded.code.is_ok());
    }

    #[test]
    fn test_message_type_from_u8() {
        assert_eq!(MessageType::from_u8(0x01), Some(MessageType::Config));
        assert_eq!(MessageType::from_u8(0x02), Some(MessageType::Content));
        assert_eq!(MessageType::from_u8(0x11), Some(MessageType::Status));
        assert_eq!(MessageType::from_u8(0xFF), None);
    }

    #[tokio::test]
    async fn test_frame_io_roundtrip() {
        let status = Status::ok();
        let frame = status.encode();

        let mut wire = Vec::new();
        write_frame(&mut wire, &frame).await.unwrap();

        let mut reader = wire.as_slice();
        let (msg_type, payload) = read_frame(&mut reader).await.unwrap();
        assert_eq!(msg_type, MessageType::Status);
        let decoded = Status::decode(payload).unwrap();
        assert!(decoded.code.is_ok());
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_frame() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_be_bytes());
        wire.push(MessageType::Content as u8);

        let mut reader = wire.as_slice();
        assert!(read_frame(&mut reader).await.is_err());
    }
}
