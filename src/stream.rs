//! Stream information, lifecycle state, and the multi-stream registry.
//!
//! A [`StreamInfo`] describes one video stream — session name,
//! dimensions, framerate, pixel format — and is shared by the payloader
//! and depayloader so both sides agree on segment geometry.
//!
//! ## Receive lifecycle
//!
//! ```text
//! open()  -> Open
//! start() -> Started   (packets accepted)
//! stop()  -> Stopped   (packets rejected, can quickly re-start)
//! close() -> Closed    (pending reassembly flushed)
//! ```
//!
//! The state machine carries no sockets — transport is the caller's
//! collaborator. It exists so a receiver can be paused and resumed
//! without tearing down reassembly configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::depayloader::{Event, RawDepayloader};
use crate::error::{FrameErrorKind, Result, RtpError};
use crate::frame::PixelFormat;
use crate::packet::VIDEO_CLOCK_RATE;

/// Description of one uncompressed video stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Session name, used as the registry key.
    pub name: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in scanlines.
    pub height: u32,
    /// Nominal frame rate in frames per second.
    pub framerate: u32,
    /// Sample format.
    pub format: PixelFormat,
}

impl StreamInfo {
    /// Create and validate stream information.
    ///
    /// The same dimension rules as [`Frame`](crate::frame::Frame) apply;
    /// framerate must be non-zero and at most the 90 kHz media clock.
    pub fn new(
        name: &str,
        format: PixelFormat,
        width: u32,
        height: u32,
        framerate: u32,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::ZeroDimension,
            });
        }
        if framerate == 0 {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::ZeroFramerate,
            });
        }
        let group_pixels = format.pgroup_pixels() as u32;
        if width % group_pixels != 0 {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::UnalignedWidth {
                    width,
                    group_pixels,
                },
            });
        }
        if width > 0x7FFF || height > 0x7FFF || framerate > VIDEO_CLOCK_RATE {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::ExceedsFieldRange { width, height },
            });
        }
        Ok(Self {
            name: name.to_string(),
            width,
            height,
            framerate,
            format,
        })
    }

    /// Octets of samples in one scanline.
    pub fn line_octets(&self) -> usize {
        self.format.line_octets(self.width)
    }

    /// Octets of samples in one tight frame.
    pub fn frame_octets(&self) -> usize {
        self.line_octets() * self.height as usize
    }

    /// RTP timestamp increment per frame at the 90 kHz media clock.
    pub fn timestamp_increment(&self) -> u32 {
        VIDEO_CLOCK_RATE / self.framerate
    }
}

/// Lifecycle state of a receive stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not yet opened, or closed.
    Closed,
    /// Configured but not accepting packets.
    Open,
    /// Accepting packets.
    Started,
    /// Paused; packets are rejected until re-started.
    Stopped,
}

/// A receive stream: a depayloader gated by lifecycle state.
///
/// Pushing packets while the stream is not `Started` fails with
/// [`RtpError::StreamNotStarted`]; reassembly state survives a
/// stop/start cycle but not a close.
pub struct RxStream {
    info: StreamInfo,
    depayloader: RawDepayloader,
    state: StreamState,
}

impl RxStream {
    pub fn new(info: StreamInfo) -> Self {
        let depayloader = RawDepayloader::new(info.clone());
        Self {
            info,
            depayloader,
            state: StreamState::Closed,
        }
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn open(&mut self) {
        self.set_state(StreamState::Open);
    }

    pub fn start(&mut self) {
        self.set_state(StreamState::Started);
    }

    pub fn stop(&mut self) {
        self.set_state(StreamState::Stopped);
    }

    /// Close the stream, expiring all in-flight reassembly buffers.
    ///
    /// Returns the incomplete-frame events for anything still pending.
    pub fn close(&mut self) -> Vec<Event> {
        self.set_state(StreamState::Closed);
        self.depayloader.flush()
    }

    fn set_state(&mut self, state: StreamState) {
        tracing::debug!(
            stream = %self.info.name,
            old_state = ?self.state,
            new_state = ?state,
            "stream state transition"
        );
        self.state = state;
    }

    /// Feed one received packet through the depayloader.
    pub fn push(&mut self, packet: &[u8], arrival: Instant) -> Result<Vec<Event>> {
        if self.state != StreamState::Started {
            return Err(RtpError::StreamNotStarted(self.info.name.clone()));
        }
        self.depayloader.push(packet, arrival)
    }

    /// Expire stale reassembly buffers without feeding a packet.
    pub fn expire(&mut self, now: Instant) -> Vec<Event> {
        self.depayloader.expire(now)
    }
}

/// Thread-safe registry of named receive streams.
///
/// Backed by `parking_lot::RwLock` for fast concurrent reads; each
/// stream sits behind its own `Mutex` so one receiver thread can push
/// packets while another inspects the registry. Lookup happens per
/// received datagram, so read performance matters.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<RwLock<HashMap<String, Arc<Mutex<RxStream>>>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new receive stream. Replaces any existing stream with
    /// the same session name.
    pub fn add(&self, info: StreamInfo) -> Arc<Mutex<RxStream>> {
        let name = info.name.clone();
        let stream = Arc::new(Mutex::new(RxStream::new(info)));
        self.streams.write().insert(name.clone(), stream.clone());
        tracing::info!(stream = %name, "stream registered");
        stream
    }

    /// Look up a stream by session name.
    pub fn get(&self, name: &str) -> Option<Arc<Mutex<RxStream>>> {
        self.streams.read().get(name).cloned()
    }

    /// Remove a stream, closing it and returning any flush events.
    pub fn remove(&self, name: &str) -> Option<Vec<Event>> {
        let removed = self.streams.write().remove(name);
        removed.map(|s| {
            tracing::info!(stream = %name, "stream removed");
            s.lock().close()
        })
    }

    /// Push a packet to the named stream.
    pub fn push_to(&self, name: &str, packet: &[u8], arrival: Instant) -> Result<Vec<Event>> {
        let stream = self
            .get(name)
            .ok_or_else(|| RtpError::UnknownStream(name.to_string()))?;
        let mut stream = stream.lock();
        stream.push(packet, arrival)
    }

    /// Session names of all registered streams.
    pub fn names(&self) -> Vec<String> {
        self.streams.read().keys().cloned().collect()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> StreamInfo {
        StreamInfo::new(name, PixelFormat::Rgb24, 64, 48, 25).unwrap()
    }

    #[test]
    fn timestamp_increment_from_framerate() {
        assert_eq!(info("s").timestamp_increment(), 3600);
        let i30 = StreamInfo::new("s", PixelFormat::Rgb24, 64, 48, 30).unwrap();
        assert_eq!(i30.timestamp_increment(), 3000);
    }

    #[test]
    fn zero_framerate_rejected() {
        let err = StreamInfo::new("s", PixelFormat::Rgb24, 64, 48, 0).unwrap_err();
        match err {
            RtpError::InvalidFrame { kind } => assert_eq!(kind, FrameErrorKind::ZeroFramerate),
            other => panic!("expected InvalidFrame, got {other:?}"),
        }
    }

    #[test]
    fn lifecycle_gates_push() {
        let mut rx = RxStream::new(info("s"));
        assert_eq!(rx.state(), StreamState::Closed);
        let err = rx.push(&[0u8; 20], Instant::now()).unwrap_err();
        assert!(matches!(err, RtpError::StreamNotStarted(_)));

        rx.open();
        rx.start();
        assert_eq!(rx.state(), StreamState::Started);
        // Garbage packet now reaches the depayloader and fails parse
        // instead of being gated.
        let err = rx.push(&[0u8; 20], Instant::now()).unwrap_err();
        assert!(matches!(err, RtpError::Malformed { .. }));

        rx.stop();
        let err = rx.push(&[0u8; 20], Instant::now()).unwrap_err();
        assert!(matches!(err, RtpError::StreamNotStarted(_)));
    }

    #[test]
    fn registry_add_get_remove() {
        let registry = StreamRegistry::new();
        registry.add(info("cam1"));
        registry.add(info("cam2"));

        assert!(registry.get("cam1").is_some());
        assert!(registry.get("nope").is_none());

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["cam1", "cam2"]);

        assert!(registry.remove("cam1").is_some());
        assert!(registry.get("cam1").is_none());
    }

    #[test]
    fn registry_push_unknown_stream() {
        let registry = StreamRegistry::new();
        let err = registry
            .push_to("ghost", &[0u8; 20], Instant::now())
            .unwrap_err();
        assert!(matches!(err, RtpError::UnknownStream(_)));
    }

    #[test]
    fn registry_many_streams() {
        // A receiver watching many multicast sources at once.
        let registry = StreamRegistry::new();
        for i in 0..10 {
            registry.add(info(&format!("stream-{i}")));
        }
        assert_eq!(registry.names().len(), 10);
        for i in 0..10 {
            registry.get(&format!("stream-{i}")).unwrap().lock().start();
        }
    }
}
