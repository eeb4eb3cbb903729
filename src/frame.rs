//! Raw video frames and pixel formats.
//!
//! A [`Frame`] is one complete image: dimensions, a [`PixelFormat`], a
//! scanline stride, and an owned sample buffer. Frames are the input to
//! the [`RawPayloader`](crate::payloader::RawPayloader) and the output of
//! the [`RawDepayloader`](crate::depayloader::RawDepayloader).
//!
//! ## Pixel groups
//!
//! RFC 4175 packetizes samples in *pgroups* — the smallest run of pixels
//! that occupies a whole number of octets. Segment offsets and lengths
//! must fall on pgroup boundaries, so all sizing here is derived from
//! [`PixelFormat::pgroup_octets`] and [`PixelFormat::pgroup_pixels`].

use crate::error::{FrameErrorKind, Result, RtpError};

/// Sample format of an uncompressed video stream.
///
/// These are the colourspaces carried by RFC 4175 that this library
/// supports, with their pgroup geometry:
///
/// | Format | Sampling | pgroup | pixels/pgroup |
/// |--------|----------|--------|---------------|
/// | `Rgb24` | RGB 8-bit | 3 octets | 1 |
/// | `Uyvy` | YCbCr-4:2:2 8-bit | 4 octets | 2 |
/// | `Mono8` | grayscale 8-bit | 1 octet | 1 |
/// | `Mono16` | grayscale 16-bit | 2 octets | 1 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGB, 3 bytes per pixel.
    Rgb24,
    /// 8-bit YCbCr 4:2:2 (U Y V Y ordering), 4 bytes per 2 pixels.
    Uyvy,
    /// 8-bit grayscale.
    Mono8,
    /// 16-bit grayscale, big-endian samples.
    Mono16,
}

impl PixelFormat {
    /// Octets per pixel group.
    pub const fn pgroup_octets(self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Uyvy => 4,
            Self::Mono8 => 1,
            Self::Mono16 => 2,
        }
    }

    /// Pixels per pixel group.
    pub const fn pgroup_pixels(self) -> usize {
        match self {
            Self::Rgb24 | Self::Mono8 | Self::Mono16 => 1,
            Self::Uyvy => 2,
        }
    }

    /// Octets in one scanline of `width` pixels.
    ///
    /// `width` must already be pgroup-aligned (validated by
    /// [`Frame::new`] and [`StreamInfo::new`](crate::stream::StreamInfo::new)).
    pub const fn line_octets(self, width: u32) -> usize {
        width as usize / self.pgroup_pixels() * self.pgroup_octets()
    }

    /// Sampling name as it appears in RFC 4175 media parameters
    /// (e.g. `sampling=YCbCr-4:2:2`).
    pub const fn sampling(self) -> &'static str {
        match self {
            Self::Rgb24 => "RGB",
            Self::Uyvy => "YCbCr-4:2:2",
            Self::Mono8 | Self::Mono16 => "GRAYSCALE",
        }
    }

    /// Sample depth in bits for RFC 4175 media parameters.
    pub const fn depth(self) -> u32 {
        match self {
            Self::Rgb24 | Self::Uyvy | Self::Mono8 => 8,
            Self::Mono16 => 16,
        }
    }
}

/// One complete uncompressed video frame.
///
/// The buffer holds `stride` bytes per scanline; only the first
/// [`line_octets`](PixelFormat::line_octets) of each scanline carry
/// samples. Frames produced by the depayloader are always tight
/// (`stride == line_octets`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Create a tightly-packed frame (`stride == line_octets`).
    pub fn new(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let stride = format.line_octets(width);
        Self::with_stride(format, width, height, stride, data)
    }

    /// Create a frame with an explicit scanline stride.
    ///
    /// Fails with [`RtpError::InvalidFrame`] when dimensions, stride, or
    /// buffer length are inconsistent with the declared pixel format.
    pub fn with_stride(
        format: PixelFormat,
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::ZeroDimension,
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
        // Line numbers and pixel offsets travel in 15-bit wire fields.
        if width > 0x7FFF || height > 0x7FFF {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::ExceedsFieldRange { width, height },
            });
        }
        let line_octets = format.line_octets(width);
        if stride < line_octets {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::StrideTooSmall {
                    stride,
                    needed: line_octets,
                },
            });
        }
        let expected = stride * height as usize;
        if data.len() != expected {
            return Err(RtpError::InvalidFrame {
                kind: FrameErrorKind::BufferLength {
                    expected,
                    actual: data.len(),
                },
            });
        }
        Ok(Self {
            width,
            height,
            format,
            stride,
            data,
        })
    }

    /// Zero-filled tight frame, used by the depayloader as its
    /// reassembly arena.
    pub(crate) fn black(format: PixelFormat, width: u32, height: u32) -> Self {
        let stride = format.line_octets(width);
        Self {
            width,
            height,
            format,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Scanline stride in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Octets of samples in one scanline (excludes stride padding).
    pub fn line_octets(&self) -> usize {
        self.format.line_octets(self.width)
    }

    /// Sample bytes of scanline `line` (stride padding excluded).
    ///
    /// Panics if `line >= height`; callers index within the validated
    /// frame dimensions.
    pub fn line(&self, line: u32) -> &[u8] {
        let start = line as usize * self.stride;
        &self.data[start..start + self.line_octets()]
    }

    pub(crate) fn line_mut(&mut self, line: u32) -> &mut [u8] {
        let octets = self.line_octets();
        let start = line as usize * self.stride;
        &mut self.data[start..start + octets]
    }

    /// The whole sample buffer, including any stride padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the frame, returning its sample buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
