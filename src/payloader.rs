//! Uncompressed-video RTP payloader (RFC 4175).
//!
//! Converts raw [`Frame`]s into MTU-bounded RTP packets. Each scanline
//! is split into pgroup-aligned segments; short segments from adjacent
//! lines are packed into one packet when they fit, so narrow frames do
//! not pay one packet per line.

use crate::error::{FrameErrorKind, Result, RtpError};
use crate::frame::Frame;
use crate::packet::{
    DEFAULT_PAYLOAD_TYPE, EXT_SEQ_LEN, RTP_HEADER_LEN, RtpHeader, SEGMENT_HEADER_LEN,
    write_segment_header,
};
use crate::stream::StreamInfo;

/// Default maximum RTP packet size in octets, headers included.
///
/// 1400 leaves room for IP/UDP headers within a 1500-byte Ethernet MTU.
pub const DEFAULT_MTU: usize = 1400;

/// RFC 4175 payloader for one outbound stream.
///
/// Holds the RTP header state (sequence, timestamp, SSRC) as explicit
/// instance fields — two payloaders never share counters. All packets
/// of one frame carry the same timestamp; the timestamp advances by
/// [`StreamInfo::timestamp_increment`] between frames.
///
/// ```
/// use rtpraw::{PixelFormat, RawPayloader, StreamInfo, pattern};
///
/// let info = StreamInfo::new("demo", PixelFormat::Rgb24, 64, 48, 25)?;
/// let mut payloader = RawPayloader::new(info.clone(), rtpraw::DEFAULT_MTU)?;
/// let frame = pattern::checkered(&info, 0);
/// let packets = payloader.packetize(&frame)?;
/// assert!(packets.iter().all(|p| p.len() <= rtpraw::DEFAULT_MTU));
/// # Ok::<(), rtpraw::RtpError>(())
/// ```
#[derive(Debug)]
pub struct RawPayloader {
    info: StreamInfo,
    header: RtpHeader,
    mtu: usize,
}

impl RawPayloader {
    /// Create a payloader with a random SSRC (RFC 3550 §8.1) and the
    /// conventional dynamic payload type 96.
    ///
    /// `mtu` bounds the total packet size, headers included. Fails with
    /// [`RtpError::PacketTooLarge`] when a single pixel group cannot fit
    /// behind the RTP and payload headers.
    pub fn new(info: StreamInfo, mtu: usize) -> Result<Self> {
        Self::with_ssrc(info, mtu, DEFAULT_PAYLOAD_TYPE, rand_ssrc())
    }

    /// Create with explicit payload type and SSRC.
    pub fn with_ssrc(info: StreamInfo, mtu: usize, pt: u8, ssrc: u32) -> Result<Self> {
        // A UDP datagram caps at 64 KiB; larger MTUs would also overflow
        // the 16-bit segment length field.
        let mtu = mtu.min(u16::MAX as usize);
        let needed = RTP_HEADER_LEN + EXT_SEQ_LEN + SEGMENT_HEADER_LEN + info.format.pgroup_octets();
        if mtu < needed {
            return Err(RtpError::PacketTooLarge { mtu, needed });
        }
        Ok(Self {
            info,
            header: RtpHeader::new(pt, ssrc),
            mtu,
        })
    }

    /// The stream this payloader was configured for.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Next 32-bit extended sequence number.
    pub fn next_sequence(&self) -> u32 {
        self.header.sequence()
    }

    /// Next RTP timestamp as it will appear on the wire.
    pub fn next_rtp_timestamp(&self) -> u32 {
        self.header.timestamp() as u32
    }

    /// Packetize one frame into ready-to-send RTP packets.
    ///
    /// Together the packets cover every pixel exactly once, each packet
    /// fits within the MTU, and the last packet carries the marker bit
    /// (RFC 4175 §4.2). Fails with [`RtpError::InvalidFrame`] when the
    /// frame does not match the configured stream.
    pub fn packetize(&mut self, frame: &Frame) -> Result<Vec<Vec<u8>>> {
        if frame.width() != self.info.width
            || frame.height() != self.info.height
            || frame.format() != self.info.format
        {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::StreamMismatch,
            });
        }

        let pgroup = self.info.format.pgroup_octets();
        let group_pixels = self.info.format.pgroup_pixels();
        let line_octets = self.info.line_octets();
        let height = self.info.height;

        let mut packets = Vec::new();
        let mut line: u32 = 0;
        let mut line_byte: usize = 0;

        while line < height {
            // Gather segments for one packet.
            let mut segments: Vec<(u16, u16, usize, usize)> = Vec::new(); // (line, offset_px, start, len)
            let mut used = RTP_HEADER_LEN + EXT_SEQ_LEN;

            while line < height && used + SEGMENT_HEADER_LEN + pgroup <= self.mtu {
                let capacity = self.mtu - used - SEGMENT_HEADER_LEN;
                let remaining = line_octets - line_byte;
                let take = remaining.min(capacity / pgroup * pgroup);

                let offset_px = (line_byte / pgroup * group_pixels) as u16;
                segments.push((line as u16, offset_px, line_byte, take));
                used += SEGMENT_HEADER_LEN + take;

                line_byte += take;
                if line_byte == line_octets {
                    line += 1;
                    line_byte = 0;
                }
            }

            let last = line >= height;
            let ext_seq = (self.header.sequence() >> 16) as u16;
            let fixed = self.header.write(last);

            let mut packet = Vec::with_capacity(used);
            packet.extend_from_slice(&fixed);
            packet.extend_from_slice(&ext_seq.to_be_bytes());
            for (i, &(seg_line, offset_px, _, len)) in segments.iter().enumerate() {
                let continuation = i + 1 < segments.len();
                write_segment_header(&mut packet, len as u16, seg_line, offset_px, continuation);
            }
            for &(seg_line, _, start, len) in &segments {
                packet.extend_from_slice(&frame.line(seg_line as u32)[start..start + len]);
            }
            packets.push(packet);
        }

        self.header.advance_timestamp(self.info.timestamp_increment());

        tracing::trace!(
            stream = %self.info.name,
            rtp_packets = packets.len(),
            frame_bytes = self.info.frame_octets(),
            seq = self.header.sequence(),
            ts = self.header.timestamp(),
            "frame packetized"
        );

        Ok(packets)
    }
}

fn rand_ssrc() -> u32 {
    use rand::RngExt;
    rand::rng().random::<u32>()
}
