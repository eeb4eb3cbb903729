//! RTP fixed header and RFC 4175 payload header serialization/parsing.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Extended Sequence Number   |           Length 1st          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |F|      Line No 1st            |C|        Offset 1st           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Length 2nd (C was set)     |F|         Line No 2nd         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |C|        Offset 2nd           |  sample data ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The fixed header (RFC 3550 §5.1) is followed by the RFC 4175 §4.3
//! payload header: a 16-bit extended sequence number, then one or more
//! 6-byte segment headers (the C bit flags a following header), then the
//! sample data blocks in header order.

use rand::RngExt;

use crate::error::{PacketErrorKind, Result, RtpError};

/// Length of the RTP fixed header (RFC 3550 §5.1).
pub const RTP_HEADER_LEN: usize = 12;
/// Length of the extended sequence number field (RFC 4175 §4.3).
pub const EXT_SEQ_LEN: usize = 2;
/// Length of one segment header: length, F|line, C|offset.
pub const SEGMENT_HEADER_LEN: usize = 6;
/// Dynamic payload type conventionally used for raw video.
pub const DEFAULT_PAYLOAD_TYPE: u8 = 96;
/// RTP media clock for video (RFC 4175 §5: 90 kHz).
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

const RTP_VERSION: u8 = 2;

/// RTP fixed header state for the sending side.
///
/// Manages:
/// - **Sequence number**: held as u32 internally; the low 16 bits go in
///   the fixed header (wrapping), the high 16 bits in the RFC 4175
///   extended sequence number field.
/// - **Timestamp**: stored as u64 to avoid wrapping arithmetic during
///   duration calculations; the lower 32 bits are written to the wire.
/// - **SSRC**: randomly generated per RFC 3550 §8.1 to avoid collisions.
///
/// Version is always 2. Padding, extension, and CSRC count are always 0.
#[derive(Debug)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub pt: u8,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    sequence: u32,
    timestamp: u64,
}

impl RtpHeader {
    /// Create a new RTP header state with explicit SSRC.
    pub fn new(pt: u8, ssrc: u32) -> Self {
        tracing::debug!(
            pt,
            ssrc = format_args!("{:#010X}", ssrc),
            "RTP header state created"
        );
        Self {
            pt,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Create with a random SSRC.
    ///
    /// Per RFC 3550 §8.1, the SSRC should be chosen randomly to minimize
    /// the probability of collisions between independent sessions.
    pub fn with_random_ssrc(pt: u8) -> Self {
        let ssrc = rand::rng().random::<u32>();
        Self::new(pt, ssrc)
    }

    /// Current 32-bit extended sequence number (before the next
    /// [`write`](Self::write) call).
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Current timestamp (internal u64 representation).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Serialize a 12-byte RTP fixed header and advance the sequence
    /// number.
    ///
    /// The `marker` bit (RFC 3550 §5.1) signals the last packet of a
    /// frame (RFC 4175 §4.2).
    pub fn write(&mut self, marker: bool) -> [u8; RTP_HEADER_LEN] {
        let first_byte: u8 = RTP_VERSION << 6;
        let second_byte: u8 = ((marker as u8) << 7) | self.pt;

        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&(self.sequence as u16).to_be_bytes());
        header[4..8].copy_from_slice(&(self.timestamp as u32).to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        self.sequence = self.sequence.wrapping_add(1);
        header
    }

    /// Advance the RTP timestamp by the given increment.
    ///
    /// For video at the 90 kHz clock rate, the increment per frame is
    /// `90000 / fps` (e.g. 3000 for 30 fps, 3600 for 25 fps).
    pub fn advance_timestamp(&mut self, increment: u32) {
        self.timestamp = self.timestamp.wrapping_add(increment as u64);
    }
}

/// Append one 6-byte segment header to an outgoing packet.
///
/// `length` is in octets, `line` and `offset` in the RFC 4175 15-bit
/// fields (offset counts pixels). `continuation` sets the C bit,
/// announcing another segment header after this one. The F (field) bit
/// is always 0 — progressive scan only.
pub(crate) fn write_segment_header(
    buf: &mut Vec<u8>,
    length: u16,
    line: u16,
    offset: u16,
    continuation: bool,
) {
    buf.extend_from_slice(&length.to_be_bytes());
    buf.extend_from_slice(&(line & 0x7FFF).to_be_bytes());
    let offset_word = ((continuation as u16) << 15) | (offset & 0x7FFF);
    buf.extend_from_slice(&offset_word.to_be_bytes());
}

/// One scanline segment carried by a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRef<'a> {
    /// Scanline number (15-bit).
    pub line: u16,
    /// Interlace field bit (always 0 for the streams this library sends).
    pub field: bool,
    /// Horizontal offset of the first pixel of the segment, in pixels.
    pub offset: u16,
    /// Sample data for this segment.
    pub data: &'a [u8],
}

/// A received RTP raw-video packet, parsed in place.
///
/// Borrowing parse: segment data points into the caller's receive
/// buffer, so a packet can be inspected and copied into a reassembly
/// arena without intermediate allocation.
#[derive(Debug)]
pub struct PacketRef<'a> {
    /// Marker bit — set on the last packet of a frame.
    pub marker: bool,
    /// RTP payload type.
    pub payload_type: u8,
    /// Full 32-bit sequence number (fixed header low bits + RFC 4175
    /// extended sequence number high bits).
    pub sequence: u32,
    /// RTP media timestamp (90 kHz clock). All packets of one frame
    /// share this value.
    pub timestamp: u32,
    /// Synchronization source identifier.
    pub ssrc: u32,
    /// Scanline segments, in wire order.
    pub segments: Vec<SegmentRef<'a>>,
}

impl<'a> PacketRef<'a> {
    /// Parse an RTP raw-video packet.
    ///
    /// Tolerates padding, header extensions, and CSRC entries from
    /// foreign senders (RFC 3550 §5.1), even though this library's
    /// payloader emits none of them.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < RTP_HEADER_LEN {
            return Err(malformed(PacketErrorKind::Truncated));
        }
        let version = buf[0] >> 6;
        if version != RTP_VERSION {
            return Err(malformed(PacketErrorKind::BadVersion(version)));
        }
        let padding = buf[0] & 0x20 != 0;
        let extension = buf[0] & 0x10 != 0;
        let csrc_count = (buf[0] & 0x0F) as usize;
        let marker = buf[1] & 0x80 != 0;
        let payload_type = buf[1] & 0x7F;
        let sequence_low = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut end = buf.len();
        if padding {
            let pad = buf[buf.len() - 1] as usize;
            if pad == 0 || pad > end - RTP_HEADER_LEN {
                return Err(malformed(PacketErrorKind::Truncated));
            }
            end -= pad;
        }

        let mut pos = RTP_HEADER_LEN + csrc_count * 4;
        if extension {
            if end < pos + 4 {
                return Err(malformed(PacketErrorKind::Truncated));
            }
            let words = u16::from_be_bytes([buf[pos + 2], buf[pos + 3]]) as usize;
            pos += 4 + words * 4;
        }
        if end < pos + EXT_SEQ_LEN {
            return Err(malformed(PacketErrorKind::Truncated));
        }
        let sequence_high = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        let sequence = ((sequence_high as u32) << 16) | sequence_low as u32;
        pos += EXT_SEQ_LEN;

        // Segment headers first, then the data blocks in the same order.
        struct RawSegment {
            length: u16,
            field: bool,
            line: u16,
            offset: u16,
        }
        let mut headers: Vec<RawSegment> = Vec::new();
        loop {
            if end < pos + SEGMENT_HEADER_LEN {
                return Err(malformed(PacketErrorKind::ShortSegmentHeader));
            }
            let length = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
            let line_word = u16::from_be_bytes([buf[pos + 2], buf[pos + 3]]);
            let offset_word = u16::from_be_bytes([buf[pos + 4], buf[pos + 5]]);
            pos += SEGMENT_HEADER_LEN;

            headers.push(RawSegment {
                length,
                field: line_word & 0x8000 != 0,
                line: line_word & 0x7FFF,
                offset: offset_word & 0x7FFF,
            });
            if offset_word & 0x8000 == 0 {
                break;
            }
        }

        let mut segments = Vec::with_capacity(headers.len());
        for h in headers {
            let next = pos + h.length as usize;
            if next > end {
                return Err(malformed(PacketErrorKind::SegmentOverrun));
            }
            segments.push(SegmentRef {
                line: h.line,
                field: h.field,
                offset: h.offset,
                data: &buf[pos..next],
            });
            pos = next;
        }

        Ok(Self {
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            segments,
        })
    }
}

fn malformed(kind: PacketErrorKind) -> RtpError {
    RtpError::Malformed { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_header() -> RtpHeader {
        RtpHeader::new(96, 0xAABBCCDD)
    }

    /// Hand-build a one-segment packet the way the payloader does.
    fn build_packet(header: &mut RtpHeader, marker: bool, line: u16, offset: u16, data: &[u8]) -> Vec<u8> {
        let ext = (header.sequence() >> 16) as u16;
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&header.write(marker));
        pkt.extend_from_slice(&ext.to_be_bytes());
        write_segment_header(&mut pkt, data.len() as u16, line, offset, false);
        pkt.extend_from_slice(data);
        pkt
    }

    #[test]
    fn version_is_2() {
        let mut h = make_header();
        let buf = h.write(false);
        assert_eq!(buf[0] >> 6, 2);
    }

    #[test]
    fn marker_bit() {
        let mut h = make_header();
        let no_marker = h.write(false);
        assert_eq!(no_marker[1] & 0x80, 0);

        let with_marker = h.write(true);
        assert_eq!(with_marker[1] & 0x80, 0x80);
    }

    #[test]
    fn sequence_increments() {
        let mut h = make_header();
        let b1 = h.write(false);
        let seq1 = u16::from_be_bytes([b1[2], b1[3]]);
        let b2 = h.write(false);
        let seq2 = u16::from_be_bytes([b2[2], b2[3]]);
        assert_eq!(seq2, seq1 + 1);
    }

    #[test]
    fn sequence_wraps_on_wire_not_internally() {
        let mut h = make_header();
        h.sequence = u16::MAX as u32;
        let buf = h.write(false);
        let seq = u16::from_be_bytes([buf[2], buf[3]]);
        assert_eq!(seq, u16::MAX);
        // Internal counter keeps going; high bits land in the extended
        // sequence number field.
        assert_eq!(h.sequence(), 0x1_0000);
    }

    #[test]
    fn timestamp_advance() {
        let mut h = make_header();
        h.advance_timestamp(3000);
        assert_eq!(h.timestamp(), 3000);
        h.advance_timestamp(3000);
        assert_eq!(h.timestamp(), 6000);
    }

    #[test]
    fn random_ssrc_differs() {
        let h1 = RtpHeader::with_random_ssrc(96);
        let h2 = RtpHeader::with_random_ssrc(96);
        assert_ne!(h1.ssrc, h2.ssrc);
    }

    #[test]
    fn parse_single_segment() {
        let mut h = make_header();
        h.advance_timestamp(3000);
        let pkt = build_packet(&mut h, true, 7, 4, &[1, 2, 3, 4, 5, 6]);

        let parsed = PacketRef::parse(&pkt).unwrap();
        assert!(parsed.marker);
        assert_eq!(parsed.payload_type, 96);
        assert_eq!(parsed.sequence, 0);
        assert_eq!(parsed.timestamp, 3000);
        assert_eq!(parsed.ssrc, 0xAABBCCDD);
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].line, 7);
        assert_eq!(parsed.segments[0].offset, 4);
        assert_eq!(parsed.segments[0].data, &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn parse_two_segments() {
        let mut h = make_header();
        let ext = (h.sequence() >> 16) as u16;
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&h.write(false));
        pkt.extend_from_slice(&ext.to_be_bytes());
        write_segment_header(&mut pkt, 3, 0, 0, true);
        write_segment_header(&mut pkt, 2, 1, 0, false);
        pkt.extend_from_slice(&[10, 11, 12]);
        pkt.extend_from_slice(&[20, 21]);

        let parsed = PacketRef::parse(&pkt).unwrap();
        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].data, &[10, 11, 12]);
        assert_eq!(parsed.segments[1].line, 1);
        assert_eq!(parsed.segments[1].data, &[20, 21]);
    }

    #[test]
    fn extended_sequence_reconstructed() {
        let mut h = make_header();
        h.sequence = 0x0003_0001;
        let pkt = build_packet(&mut h, false, 0, 0, &[0; 3]);
        let parsed = PacketRef::parse(&pkt).unwrap();
        assert_eq!(parsed.sequence, 0x0003_0001);
    }

    #[test]
    fn parse_tolerates_padding() {
        let mut h = make_header();
        let mut pkt = build_packet(&mut h, false, 2, 0, &[9, 9, 9]);
        pkt[0] |= 0x20; // P bit
        pkt.extend_from_slice(&[0, 0, 3]); // 3 padding octets, count in last
        let parsed = PacketRef::parse(&pkt).unwrap();
        assert_eq!(parsed.segments[0].data, &[9, 9, 9]);
    }

    #[test]
    fn truncated_rejected() {
        let err = PacketRef::parse(&[0x80, 96, 0, 1]).unwrap_err();
        assert!(matches!(
            err,
            RtpError::Malformed {
                kind: PacketErrorKind::Truncated
            }
        ));
    }

    #[test]
    fn bad_version_rejected() {
        let mut h = make_header();
        let mut pkt = build_packet(&mut h, false, 0, 0, &[0; 3]);
        pkt[0] = 0x40; // version 1
        let err = PacketRef::parse(&pkt).unwrap_err();
        assert!(matches!(
            err,
            RtpError::Malformed {
                kind: PacketErrorKind::BadVersion(1)
            }
        ));
    }

    #[test]
    fn segment_overrun_rejected() {
        let mut h = make_header();
        let ext = 0u16;
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&h.write(false));
        pkt.extend_from_slice(&ext.to_be_bytes());
        write_segment_header(&mut pkt, 100, 0, 0, false);
        pkt.extend_from_slice(&[0; 10]); // declares 100, carries 10
        let err = PacketRef::parse(&pkt).unwrap_err();
        assert!(matches!(
            err,
            RtpError::Malformed {
                kind: PacketErrorKind::SegmentOverrun
            }
        ));
    }
}
