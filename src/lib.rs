//! Uncompressed-video RTP payloading and depayloading (RFC 4175).
//!
//! Two layered, I/O-free components:
//!
//! - [`RawPayloader`] turns raw [`Frame`]s into MTU-bounded RTP packets
//!   ready for a UDP-sending collaborator.
//! - [`RawDepayloader`] reassembles frames from received packets —
//!   tolerating reordering, duplication, and loss — and reports what
//!   never arrived.
//!
//! Transport, SDP/SAP negotiation, and capture are the caller's
//! collaborators; this crate only transforms bytes.
//!
//! ```
//! use std::time::Instant;
//! use rtpraw::{Event, PixelFormat, RawDepayloader, RawPayloader, StreamInfo, pattern};
//!
//! let info = StreamInfo::new("camera", PixelFormat::Uyvy, 640, 480, 25)?;
//! let mut tx = RawPayloader::new(info.clone(), rtpraw::DEFAULT_MTU)?;
//! let mut rx = RawDepayloader::new(info.clone());
//!
//! let frame = pattern::colour_bars(&info);
//! for packet in tx.packetize(&frame)? {
//!     for event in rx.push(&packet, Instant::now())? {
//!         if let Event::Frame(received) = event {
//!             assert_eq!(received, frame);
//!         }
//!     }
//! }
//! # Ok::<(), rtpraw::RtpError>(())
//! ```

pub mod depayloader;
pub mod error;
pub mod frame;
pub mod packet;
pub mod pattern;
pub mod payloader;
pub mod stream;

pub use depayloader::{Event, IncompleteFrame, LineGap, RawDepayloader};
pub use error::{Result, RtpError};
pub use frame::{Frame, PixelFormat};
pub use payloader::{DEFAULT_MTU, RawPayloader};
pub use stream::{RxStream, StreamInfo, StreamRegistry, StreamState};
