//! End-to-end properties of the payloader/depayloader pair: round-trip
//! fidelity, reordering invariance, duplicate tolerance, MTU bounds,
//! and loss reporting.

use std::time::{Duration, Instant};

use rtpraw::depayloader::DEFAULT_REASSEMBLY_TIMEOUT;
use rtpraw::{
    DEFAULT_MTU, Event, Frame, PixelFormat, RawDepayloader, RawPayloader, StreamInfo, pattern,
};

fn stream(format: PixelFormat) -> StreamInfo {
    StreamInfo::new("it", format, 128, 96, 25).unwrap()
}

fn pair(info: &StreamInfo, mtu: usize) -> (RawPayloader, RawDepayloader) {
    let tx = RawPayloader::new(info.clone(), mtu).unwrap();
    let rx = RawDepayloader::new(info.clone());
    (tx, rx)
}

fn collect_frames(rx: &mut RawDepayloader, packets: &[Vec<u8>], now: Instant) -> Vec<Frame> {
    let mut frames = Vec::new();
    for pkt in packets {
        for event in rx.push(pkt, now).unwrap() {
            if let Event::Frame(f) = event {
                frames.push(f);
            }
        }
    }
    frames
}

#[test]
fn roundtrip_every_format() {
    for format in [
        PixelFormat::Rgb24,
        PixelFormat::Uyvy,
        PixelFormat::Mono8,
        PixelFormat::Mono16,
    ] {
        let info = stream(format);
        let (mut tx, mut rx) = pair(&info, DEFAULT_MTU);
        let frame = pattern::colour_bars(&info);

        let packets = tx.packetize(&frame).unwrap();
        let frames = collect_frames(&mut rx, &packets, Instant::now());
        assert_eq!(frames.len(), 1, "{format:?}");
        assert_eq!(frames[0], frame, "{format:?} not byte-identical");
    }
}

#[test]
fn roundtrip_many_frames_in_sequence() {
    let info = stream(PixelFormat::Rgb24);
    let (mut tx, mut rx) = pair(&info, 512);
    let now = Instant::now();

    for n in 0..20 {
        let frame = pattern::checkered(&info, n);
        let packets = tx.packetize(&frame).unwrap();
        let frames = collect_frames(&mut rx, &packets, now);
        assert_eq!(frames.len(), 1, "frame {n}");
        assert_eq!(frames[0], frame, "frame {n}");
    }
    assert_eq!(rx.pending_frames(), 0);
}

#[test]
fn mtu_bound_holds_across_sizes() {
    let info = stream(PixelFormat::Uyvy);
    for mtu in [64, 200, 576, DEFAULT_MTU, 9000] {
        let mut tx = RawPayloader::new(info.clone(), mtu).unwrap();
        let packets = tx.packetize(&pattern::colour_bars(&info)).unwrap();
        assert!(
            packets.iter().all(|p| p.len() <= mtu),
            "mtu {mtu} violated"
        );
    }
}

#[test]
fn any_permutation_yields_same_frame() {
    let info = stream(PixelFormat::Rgb24);
    let (mut tx, _) = pair(&info, 400);
    let frame = pattern::checkered(&info, 3);
    let packets = tx.packetize(&frame).unwrap();
    assert!(packets.len() > 3);

    // Reversed, interleaved from both ends, and rotated deliveries.
    let reversed: Vec<Vec<u8>> = packets.iter().rev().cloned().collect();
    let mut interleaved = Vec::new();
    let (mut lo, mut hi) = (0usize, packets.len() - 1);
    while lo <= hi {
        interleaved.push(packets[hi].clone());
        if lo < hi {
            interleaved.push(packets[lo].clone());
        }
        lo += 1;
        hi = hi.saturating_sub(1);
    }
    let mut rotated = packets.clone();
    rotated.rotate_left(packets.len() / 2);

    for (name, order) in [
        ("reversed", reversed),
        ("interleaved", interleaved),
        ("rotated", rotated),
    ] {
        let mut rx = RawDepayloader::new(info.clone());
        let frames = collect_frames(&mut rx, &order, Instant::now());
        assert_eq!(frames.len(), 1, "{name}");
        assert_eq!(frames[0], frame, "{name}");
    }
}

#[test]
fn duplicated_delivery_is_idempotent() {
    let info = stream(PixelFormat::Mono8);
    let (mut tx, mut rx) = pair(&info, 300);
    let frame = pattern::checkered(&info, 0);
    let packets = tx.packetize(&frame).unwrap();

    let mut doubled = Vec::new();
    for p in &packets {
        doubled.push(p.clone());
        doubled.push(p.clone());
    }
    let now = Instant::now();
    let frames = collect_frames(&mut rx, &doubled, now);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0], frame);

    // Duplicates arriving after delivery must not leave a half-filled
    // buffer behind that would later surface as an incomplete frame.
    assert_eq!(rx.pending_frames(), 0);
    let events = rx.expire(now + DEFAULT_REASSEMBLY_TIMEOUT + Duration::from_millis(1));
    assert!(events.is_empty());
}

#[test]
fn withheld_packet_reported_missing_after_timeout() {
    let info = stream(PixelFormat::Rgb24);
    let (mut tx, mut rx) = pair(&info, 400);
    let frame = pattern::colour_bars(&info);
    let packets = tx.packetize(&frame).unwrap();
    let withheld = packets.len() / 2;

    let start = Instant::now();
    for (i, pkt) in packets.iter().enumerate() {
        if i != withheld {
            rx.push(pkt, start).unwrap();
        }
    }
    assert_eq!(rx.pending_frames(), 1);

    let events = rx.expire(start + DEFAULT_REASSEMBLY_TIMEOUT + Duration::from_millis(1));
    assert_eq!(events.len(), 1);
    let inc = match &events[0] {
        Event::Incomplete(inc) => inc,
        other => panic!("expected Incomplete, got {other:?}"),
    };

    // Only the withheld packet's bytes are missing, and the delivered
    // portion of the partial frame matches the source.
    let missing_total: usize = inc.missing.iter().map(|g| g.len).sum();
    assert!(missing_total > 0);
    // Gap accounting covers sample bytes only, never header overhead.
    assert!(missing_total < packets[withheld].len());

    for (line, complete) in inc.line_complete.iter().enumerate() {
        if *complete {
            assert_eq!(
                inc.frame.line(line as u32),
                frame.line(line as u32),
                "line {line}"
            );
        }
    }
}

#[test]
fn next_frame_completes_after_a_lost_one() {
    let info = stream(PixelFormat::Rgb24);
    let (mut tx, mut rx) = pair(&info, 400);
    let start = Instant::now();

    // Frame 0 loses a packet and is never completed.
    let lost_frame = pattern::checkered(&info, 0);
    let packets = tx.packetize(&lost_frame).unwrap();
    for pkt in packets.iter().skip(1) {
        rx.push(pkt, start).unwrap();
    }

    // Frame 1 arrives intact after the timeout: its pushes expire
    // frame 0 and then complete normally.
    let good_frame = pattern::checkered(&info, 5);
    let packets = tx.packetize(&good_frame).unwrap();
    let late = start + DEFAULT_REASSEMBLY_TIMEOUT + Duration::from_millis(5);

    let mut complete = Vec::new();
    let mut incomplete = 0;
    for pkt in &packets {
        for event in rx.push(pkt, late).unwrap() {
            match event {
                Event::Frame(f) => complete.push(f),
                Event::Incomplete(_) => incomplete += 1,
                Event::SequenceGap { .. } => {}
            }
        }
    }
    assert_eq!(incomplete, 1);
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0], good_frame);
}
