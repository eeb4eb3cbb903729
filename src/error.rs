//! Error types for the RTP raw-video library.

use std::fmt;

/// Errors that can occur while payloading or depayloading.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Payloader**: [`InvalidFrame`](Self::InvalidFrame),
///   [`PacketTooLarge`](Self::PacketTooLarge).
/// - **Depayloader**: [`Malformed`](Self::Malformed).
/// - **Stream registry**: [`UnknownStream`](Self::UnknownStream),
///   [`StreamNotStarted`](Self::StreamNotStarted).
///
/// Reassembly timeouts and sequence gaps are *not* errors — they are
/// ordinary [`Event`](crate::depayloader::Event) outputs, and the
/// depayloader keeps processing packets after any of them.
#[derive(Debug, thiserror::Error)]
pub enum RtpError {
    /// A source frame is inconsistent with its declared pixel format,
    /// dimensions, or the stream it is being sent on.
    #[error("invalid frame: {kind}")]
    InvalidFrame { kind: FrameErrorKind },

    /// The configured MTU cannot carry even a single pixel group behind
    /// the RTP and payload headers.
    #[error("MTU too small: {mtu} bytes, need at least {needed}")]
    PacketTooLarge { mtu: usize, needed: usize },

    /// A received packet could not be decoded.
    #[error("malformed packet: {kind}")]
    Malformed { kind: PacketErrorKind },

    /// No stream with the given session name exists in the
    /// [`StreamRegistry`](crate::stream::StreamRegistry).
    #[error("unknown stream: {0}")]
    UnknownStream(String),

    /// Packets were pushed to a receive stream that is not in the
    /// `Started` state.
    #[error("stream not started: {0}")]
    StreamNotStarted(String),
}

/// Specific way a source frame failed validation.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameErrorKind {
    /// Width or height was zero.
    ZeroDimension,
    /// Stream framerate was zero.
    ZeroFramerate,
    /// Width is not a whole number of pixel groups for the format.
    UnalignedWidth { width: u32, group_pixels: u32 },
    /// Width or height exceeds the 15-bit wire fields (RFC 4175 §4.3).
    ExceedsFieldRange { width: u32, height: u32 },
    /// Stride is smaller than one scanline of samples.
    StrideTooSmall { stride: usize, needed: usize },
    /// Sample buffer length does not match stride × height.
    BufferLength { expected: usize, actual: usize },
    /// Frame dimensions or format differ from the configured stream.
    StreamMismatch,
}

impl fmt::Display for FrameErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "zero width or height"),
            Self::ZeroFramerate => write!(f, "zero framerate"),
            Self::UnalignedWidth {
                width,
                group_pixels,
            } => write!(
                f,
                "width {width} not a multiple of {group_pixels}-pixel group"
            ),
            Self::ExceedsFieldRange { width, height } => {
                write!(f, "{width}x{height} exceeds 15-bit line/offset fields")
            }
            Self::StrideTooSmall { stride, needed } => {
                write!(f, "stride {stride} below scanline length {needed}")
            }
            Self::BufferLength { expected, actual } => {
                write!(f, "buffer is {actual} bytes, expected {expected}")
            }
            Self::StreamMismatch => write!(f, "frame does not match stream info"),
        }
    }
}

/// Specific kind of received-packet decode failure.
#[derive(Debug, PartialEq, Eq)]
pub enum PacketErrorKind {
    /// Shorter than the 12-byte fixed header plus extended sequence number.
    Truncated,
    /// RTP version field was not 2 (RFC 3550 §5.1).
    BadVersion(u8),
    /// Payload ended inside a segment header.
    ShortSegmentHeader,
    /// Declared segment lengths exceed the bytes present in the payload.
    SegmentOverrun,
    /// Segment length is not a whole number of pixel groups.
    UnalignedLength { length: u16 },
    /// Segment offset is not on a pixel-group boundary.
    UnalignedOffset { offset: u16 },
    /// Segment addresses a scanline beyond the stream height.
    LineOutOfRange { line: u16, height: u32 },
    /// Segment extends past the end of its scanline.
    LineOverrun { line: u16 },
}

impl fmt::Display for PacketErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated packet"),
            Self::BadVersion(v) => write!(f, "RTP version {v}, expected 2"),
            Self::ShortSegmentHeader => write!(f, "truncated segment header"),
            Self::SegmentOverrun => write!(f, "segment data past end of payload"),
            Self::UnalignedLength { length } => {
                write!(f, "segment length {length} not pgroup-aligned")
            }
            Self::UnalignedOffset { offset } => {
                write!(f, "segment offset {offset} not pgroup-aligned")
            }
            Self::LineOutOfRange { line, height } => {
                write!(f, "line {line} outside stream height {height}")
            }
            Self::LineOverrun { line } => write!(f, "segment overruns line {line}"),
        }
    }
}

/// Convenience alias for `Result<T, RtpError>`.
pub type Result<T> = std::result::Result<T, RtpError>;
