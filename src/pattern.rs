//! Synthetic test-card frames.
//!
//! Generators for checkerboard and colour-bar frames in every supported
//! [`PixelFormat`], used by the test suite and the loopback demo in
//! place of a live capture source. RGB source values are converted to
//! the target format with BT.601 luma/chroma weights.

use crate::frame::{Frame, PixelFormat};
use crate::stream::StreamInfo;

/// EBU-style 75% colour bars, left to right.
const BARS: [[u8; 3]; 8] = [
    [191, 191, 191], // white
    [191, 191, 0],   // yellow
    [0, 191, 191],   // cyan
    [0, 191, 0],     // green
    [191, 0, 191],   // magenta
    [191, 0, 0],     // red
    [0, 0, 191],     // blue
    [0, 0, 0],       // black
];

const CHECKER_SQUARE: u32 = 8;

/// Checkerboard test card.
///
/// `phase` shifts the board horizontally, giving the loopback demo a
/// moving picture so successive frames differ.
pub fn checkered(info: &StreamInfo, phase: u32) -> Frame {
    render(info, |x, y| {
        let cell = ((x + phase) / CHECKER_SQUARE + y / CHECKER_SQUARE) % 2;
        if cell == 0 { [235, 235, 235] } else { [16, 16, 16] }
    })
}

/// Vertical colour bars test card.
pub fn colour_bars(info: &StreamInfo) -> Frame {
    let width = info.width;
    render(info, move |x, _| {
        let bar = (x * BARS.len() as u32 / width) as usize;
        BARS[bar.min(BARS.len() - 1)]
    })
}

/// Single-colour frame.
pub fn solid(info: &StreamInfo, rgb: [u8; 3]) -> Frame {
    render(info, move |_, _| rgb)
}

/// Rasterize an RGB generator into the stream's pixel format.
fn render(info: &StreamInfo, rgb_at: impl Fn(u32, u32) -> [u8; 3]) -> Frame {
    let mut data = Vec::with_capacity(info.frame_octets());
    for y in 0..info.height {
        match info.format {
            PixelFormat::Rgb24 => {
                for x in 0..info.width {
                    data.extend_from_slice(&rgb_at(x, y));
                }
            }
            PixelFormat::Uyvy => {
                // 4:2:2 — chroma from the left pixel of each pair.
                for x in (0..info.width).step_by(2) {
                    let left = rgb_at(x, y);
                    let right = rgb_at(x + 1, y);
                    let (y0, u, v) = yuv(left);
                    let (y1, _, _) = yuv(right);
                    data.extend_from_slice(&[u, y0, v, y1]);
                }
            }
            PixelFormat::Mono8 => {
                for x in 0..info.width {
                    let (luma, _, _) = yuv(rgb_at(x, y));
                    data.push(luma);
                }
            }
            PixelFormat::Mono16 => {
                for x in 0..info.width {
                    let (luma, _, _) = yuv(rgb_at(x, y));
                    data.extend_from_slice(&((luma as u16) << 8).to_be_bytes());
                }
            }
        }
    }
    // Geometry comes straight from validated StreamInfo, so this
    // construction cannot fail.
    Frame::new(info.format, info.width, info.height, data)
        .unwrap_or_else(|_| Frame::black(info.format, info.width, info.height))
}

/// BT.601 full-swing RGB to YUV.
fn yuv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = (77 * r + 150 * g + 29 * b) >> 8;
    let u = ((-43 * r - 85 * g + 128 * b) >> 8) + 128;
    let v = ((128 * r - 107 * g - 21 * b) >> 8) + 128;
    (clamp(y), clamp(u), clamp(v))
}

fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(format: PixelFormat) -> StreamInfo {
        StreamInfo::new("card", format, 64, 16, 25).unwrap()
    }

    #[test]
    fn sizes_match_every_format() {
        for format in [
            PixelFormat::Rgb24,
            PixelFormat::Uyvy,
            PixelFormat::Mono8,
            PixelFormat::Mono16,
        ] {
            let i = info(format);
            let f = checkered(&i, 0);
            assert_eq!(f.data().len(), i.frame_octets(), "{format:?}");
        }
    }

    #[test]
    fn phase_moves_the_board() {
        let i = info(PixelFormat::Rgb24);
        assert_ne!(checkered(&i, 0), checkered(&i, CHECKER_SQUARE));
        // A full period brings it back.
        assert_eq!(checkered(&i, 0), checkered(&i, CHECKER_SQUARE * 2));
    }

    #[test]
    fn bars_span_all_eight_colours() {
        let i = info(PixelFormat::Rgb24);
        let f = colour_bars(&i);
        let line = f.line(0);
        let mut colours: Vec<[u8; 3]> = line.chunks(3).map(|c| [c[0], c[1], c[2]]).collect();
        colours.dedup();
        assert_eq!(colours.len(), 8);
    }

    #[test]
    fn solid_mono8_is_luma() {
        let i = info(PixelFormat::Mono8);
        let f = solid(&i, [255, 255, 255]);
        assert!(f.data().iter().all(|&b| b == 255));
    }
}
