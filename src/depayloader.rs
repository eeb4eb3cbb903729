//! Uncompressed-video RTP depayloader (RFC 4175).
//!
//! Reassembles [`Frame`]s from a lossy, possibly reordered packet
//! stream. One reassembly buffer exists per in-flight RTP timestamp; a
//! buffer is promoted to a complete frame the moment every scanline is
//! fully covered, and expired as an [`Event::Incomplete`] when it
//! outlives the reassembly timeout.
//!
//! The depayloader performs no I/O and owns no threads: the caller's
//! receive loop feeds packets through [`RawDepayloader::push`] along
//! with their arrival instants, and expiry piggybacks on those calls.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::error::{PacketErrorKind, Result, RtpError};
use crate::frame::Frame;
use crate::packet::PacketRef;
use crate::stream::StreamInfo;

/// How long a partially-received frame may wait for its missing
/// segments before being reported incomplete. Two frame intervals at
/// 25 fps.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(80);

/// Upper bound on simultaneously reassembling frames. Receivers only
/// legitimately straddle a frame boundary, so a small bound suffices;
/// anything more indicates heavy reordering or a stalled source.
pub const DEFAULT_MAX_PENDING: usize = 4;

/// How many finished (completed, expired, or evicted) timestamps are
/// remembered. Late duplicates of a finished frame are dropped rather
/// than re-opening a reassembly buffer for it, which would later
/// surface as a spurious incomplete-frame report.
const FINISHED_HISTORY: usize = 16;

/// Outputs of [`RawDepayloader::push`].
#[derive(Debug)]
pub enum Event {
    /// A frame was fully reassembled, byte-identical to the payloaded
    /// source regardless of packet arrival order.
    Frame(Frame),
    /// A frame timed out or was evicted before completion.
    Incomplete(IncompleteFrame),
    /// A discontinuity in the 32-bit extended sequence counter.
    /// Informational — reassembly continues unaffected.
    SequenceGap {
        /// Sequence number that was expected next.
        expected: u32,
        /// Sequence number actually received.
        received: u32,
        /// Packets missing in between.
        lost: u32,
    },
}

/// A reassembly that ended before every scanline was covered.
///
/// Carries the partial frame (gaps zero-filled) plus an exact map of
/// what never arrived, so consumers can render, conceal, or discard.
#[derive(Debug)]
pub struct IncompleteFrame {
    /// RTP timestamp of the abandoned frame.
    pub timestamp: u32,
    /// Partial frame data; missing regions are zero.
    pub frame: Frame,
    /// Per-scanline completeness bitmap, indexed by line number.
    pub line_complete: Vec<bool>,
    /// Byte ranges (within their scanline) that never arrived.
    pub missing: Vec<LineGap>,
    /// Whether the frame's marker packet was among those received.
    /// `false` suggests the tail of the frame was lost rather than a
    /// mid-frame packet.
    pub marker_seen: bool,
}

/// A missing byte range within one scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineGap {
    /// Scanline number.
    pub line: u16,
    /// First missing octet within the line.
    pub offset: usize,
    /// Missing octet count.
    pub len: usize,
}

/// Coverage of one scanline as sorted, disjoint, merged byte ranges.
#[derive(Debug, Default, Clone)]
struct Coverage {
    ranges: Vec<(usize, usize)>, // half-open [start, end)
}

impl Coverage {
    /// Insert a range, merging with any overlapping or adjacent ones.
    /// Re-inserting covered bytes is a no-op, which is what makes
    /// duplicate packets idempotent.
    fn insert(&mut self, start: usize, end: usize) {
        let mut merged = (start, end);
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for &(s, e) in &self.ranges {
            if e < merged.0 || s > merged.1 {
                out.push((s, e));
            } else {
                merged.0 = merged.0.min(s);
                merged.1 = merged.1.max(e);
            }
        }
        out.push(merged);
        out.sort_unstable();
        self.ranges = out;
    }

    fn is_full(&self, len: usize) -> bool {
        self.ranges == [(0, len)]
    }

    /// Uncovered ranges within `[0, len)`.
    fn gaps(&self, len: usize) -> Vec<(usize, usize)> {
        let mut gaps = Vec::new();
        let mut cursor = 0;
        for &(s, e) in &self.ranges {
            if s > cursor {
                gaps.push((cursor, s));
            }
            cursor = cursor.max(e);
        }
        if cursor < len {
            gaps.push((cursor, len));
        }
        gaps
    }
}

/// In-flight reassembly state for one RTP timestamp.
#[derive(Debug)]
struct Reassembly {
    frame: Frame,
    lines: Vec<Coverage>,
    complete_lines: usize,
    marker_seen: bool,
    created: Instant,
}

impl Reassembly {
    fn new(info: &StreamInfo, created: Instant) -> Self {
        Self {
            frame: Frame::black(info.format, info.width, info.height),
            lines: vec![Coverage::default(); info.height as usize],
            complete_lines: 0,
            marker_seen: false,
            created,
        }
    }

    fn into_incomplete(self, timestamp: u32, line_octets: usize) -> IncompleteFrame {
        let mut line_complete = Vec::with_capacity(self.lines.len());
        let mut missing = Vec::new();
        for (line, cov) in self.lines.iter().enumerate() {
            let full = cov.is_full(line_octets);
            line_complete.push(full);
            if !full {
                for (start, end) in cov.gaps(line_octets) {
                    missing.push(LineGap {
                        line: line as u16,
                        offset: start,
                        len: end - start,
                    });
                }
            }
        }
        IncompleteFrame {
            timestamp,
            frame: self.frame,
            line_complete,
            missing,
            marker_seen: self.marker_seen,
        }
    }
}

/// RFC 4175 depayloader for one inbound stream.
///
/// Single-consumer: drive it from one receive loop, or wrap it in a
/// lock (see [`StreamRegistry`](crate::stream::StreamRegistry)) when
/// fed from several threads.
#[derive(Debug)]
pub struct RawDepayloader {
    info: StreamInfo,
    timeout: Duration,
    max_pending: usize,
    pending: HashMap<u32, Reassembly>,
    finished: VecDeque<u32>,
    next_sequence: Option<u32>,
}

impl RawDepayloader {
    pub fn new(info: StreamInfo) -> Self {
        Self::with_limits(info, DEFAULT_REASSEMBLY_TIMEOUT, DEFAULT_MAX_PENDING)
    }

    /// Create with an explicit reassembly timeout and pending-frame bound.
    pub fn with_limits(info: StreamInfo, timeout: Duration, max_pending: usize) -> Self {
        Self {
            info,
            timeout,
            max_pending: max_pending.max(1),
            pending: HashMap::new(),
            finished: VecDeque::with_capacity(FINISHED_HISTORY),
            next_sequence: None,
        }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Number of frames currently being reassembled.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Process one received RTP packet.
    ///
    /// Returns every event the packet triggered: a sequence gap, frames
    /// expired by `arrival`, evictions under memory pressure, and at
    /// most one completed frame. Malformed packets fail with
    /// [`RtpError::Malformed`]; the depayloader remains usable and
    /// subsequent packets are processed normally.
    pub fn push(&mut self, packet: &[u8], arrival: Instant) -> Result<Vec<Event>> {
        let parsed = PacketRef::parse(packet)?;
        let mut events = Vec::new();

        if let Some(expected) = self.next_sequence
            && parsed.sequence > expected
        {
            let lost = parsed.sequence - expected;
            tracing::debug!(
                stream = %self.info.name,
                expected,
                received = parsed.sequence,
                lost,
                "sequence gap"
            );
            events.push(Event::SequenceGap {
                expected,
                received: parsed.sequence,
                lost,
            });
        }
        let following = parsed.sequence.wrapping_add(1);
        self.next_sequence = Some(match self.next_sequence {
            Some(n) if n > following => n,
            _ => following,
        });

        // Validate every segment against the stream geometry before
        // touching any arena, so a bad packet mutates nothing.
        let pgroup = self.info.format.pgroup_octets();
        let group_pixels = self.info.format.pgroup_pixels();
        let line_octets = self.info.line_octets();
        for seg in &parsed.segments {
            if seg.data.len() % pgroup != 0 {
                return Err(RtpError::Malformed {
                    kind: PacketErrorKind::UnalignedLength {
                        length: seg.data.len() as u16,
                    },
                });
            }
            if seg.offset as usize % group_pixels != 0 {
                return Err(RtpError::Malformed {
                    kind: PacketErrorKind::UnalignedOffset { offset: seg.offset },
                });
            }
            if seg.line as u32 >= self.info.height {
                return Err(RtpError::Malformed {
                    kind: PacketErrorKind::LineOutOfRange {
                        line: seg.line,
                        height: self.info.height,
                    },
                });
            }
            let byte_off = seg.offset as usize / group_pixels * pgroup;
            if byte_off + seg.data.len() > line_octets {
                return Err(RtpError::Malformed {
                    kind: PacketErrorKind::LineOverrun { line: seg.line },
                });
            }
        }

        events.extend(self.expire(arrival));

        // A duplicate or straggler for a frame already delivered (or
        // already given up on) must not re-open a reassembly buffer.
        if self.finished.contains(&parsed.timestamp) {
            tracing::trace!(
                stream = %self.info.name,
                ts = parsed.timestamp,
                "late packet for finished frame dropped"
            );
            return Ok(events);
        }

        if !self.pending.contains_key(&parsed.timestamp) && self.pending.len() >= self.max_pending {
            events.extend(self.evict_oldest());
        }

        let buf = self
            .pending
            .entry(parsed.timestamp)
            .or_insert_with(|| Reassembly::new(&self.info, arrival));

        for seg in &parsed.segments {
            let byte_off = seg.offset as usize / group_pixels * pgroup;
            let line = seg.line as u32;
            buf.frame.line_mut(line)[byte_off..byte_off + seg.data.len()]
                .copy_from_slice(seg.data);

            let cov = &mut buf.lines[seg.line as usize];
            let was_full = cov.is_full(line_octets);
            cov.insert(byte_off, byte_off + seg.data.len());
            if !was_full && cov.is_full(line_octets) {
                buf.complete_lines += 1;
            }
        }
        if parsed.marker {
            buf.marker_seen = true;
        }

        if buf.complete_lines == self.info.height as usize {
            let done = self.pending.remove(&parsed.timestamp).map(|r| r.frame);
            if let Some(frame) = done {
                tracing::trace!(
                    stream = %self.info.name,
                    ts = parsed.timestamp,
                    "frame reassembled"
                );
                self.remember_finished(parsed.timestamp);
                events.push(Event::Frame(frame));
            }
        }

        Ok(events)
    }

    fn remember_finished(&mut self, timestamp: u32) {
        if self.finished.len() == FINISHED_HISTORY {
            self.finished.pop_front();
        }
        self.finished.push_back(timestamp);
    }

    /// Expire reassembly buffers older than the timeout.
    ///
    /// Called internally on every [`push`](Self::push); callers with
    /// idle receive loops can also invoke it from a periodic tick.
    pub fn expire(&mut self, now: Instant) -> Vec<Event> {
        let timeout = self.timeout;
        let stale: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, r)| now.duration_since(r.created) >= timeout)
            .map(|(&ts, _)| ts)
            .collect();

        let line_octets = self.info.line_octets();
        let mut events = Vec::with_capacity(stale.len());
        for ts in stale {
            if let Some(r) = self.pending.remove(&ts) {
                tracing::debug!(
                    stream = %self.info.name,
                    timestamp = ts,
                    complete_lines = r.complete_lines,
                    height = self.info.height,
                    "reassembly timed out"
                );
                self.remember_finished(ts);
                events.push(Event::Incomplete(r.into_incomplete(ts, line_octets)));
            }
        }
        events
    }

    /// Abandon all in-flight reassembly, reporting each as incomplete.
    pub fn flush(&mut self) -> Vec<Event> {
        let line_octets = self.info.line_octets();
        let mut drained: Vec<(u32, Reassembly)> = self.pending.drain().collect();
        drained.sort_by_key(|(_, r)| r.created);
        let mut events = Vec::with_capacity(drained.len());
        for (ts, r) in drained {
            self.remember_finished(ts);
            events.push(Event::Incomplete(r.into_incomplete(ts, line_octets)));
        }
        events
    }

    fn evict_oldest(&mut self) -> Option<Event> {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, r)| r.created)
            .map(|(&ts, _)| ts)?;
        let r = self.pending.remove(&oldest)?;
        tracing::warn!(
            stream = %self.info.name,
            timestamp = oldest,
            pending = self.pending.len() + 1,
            "reassembly buffer evicted under pressure"
        );
        self.remember_finished(oldest);
        let line_octets = self.info.line_octets();
        Some(Event::Incomplete(r.into_incomplete(oldest, line_octets)))
    }
}
