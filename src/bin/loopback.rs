//! Loopback demo: payload a moving test card, push the packets straight
//! back through a depayloader, optionally dropping or reordering some
//! of them on the way.

use std::time::Instant;

use clap::Parser;
use rand::RngExt;
use rtpraw::{Event, PixelFormat, RawDepayloader, RawPayloader, StreamInfo, pattern};

#[derive(Parser)]
#[command(
    name = "rtpraw-loopback",
    about = "Payload/depayload a synthetic raw-video stream in memory"
)]
struct Args {
    /// Frame width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height in scanlines
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Frame rate (used for the RTP timestamp increment)
    #[arg(long, default_value_t = 25)]
    framerate: u32,

    /// Number of frames to run
    #[arg(long, short = 'n', default_value_t = 100)]
    frames: u32,

    /// Maximum packet size, headers included
    #[arg(long, default_value_t = rtpraw::DEFAULT_MTU)]
    mtu: usize,

    /// Percentage of packets to drop
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Deliver each frame's packets in reverse order
    #[arg(long)]
    reorder: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let info = match StreamInfo::new(
        "loopback",
        PixelFormat::Rgb24,
        args.width,
        args.height,
        args.framerate,
    ) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("bad stream parameters: {e}");
            return;
        }
    };

    let mut tx = match RawPayloader::new(info.clone(), args.mtu) {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("cannot build payloader: {e}");
            return;
        }
    };
    let mut rx = RawDepayloader::new(info.clone());
    let mut rng = rand::rng();

    let mut sent_packets = 0u64;
    let mut dropped = 0u64;
    let mut complete = 0u64;
    let mut incomplete = 0u64;
    let mut gaps = 0u64;

    for n in 0..args.frames {
        let frame = pattern::checkered(&info, n);
        let mut packets = match tx.packetize(&frame) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("packetize failed: {e}");
                return;
            }
        };
        sent_packets += packets.len() as u64;
        if args.reorder {
            packets.reverse();
        }

        for packet in &packets {
            if args.loss > 0.0 && rng.random::<f64>() * 100.0 < args.loss {
                dropped += 1;
                continue;
            }
            match rx.push(packet, Instant::now()) {
                Ok(events) => {
                    for event in events {
                        match event {
                            Event::Frame(_) => complete += 1,
                            Event::Incomplete(inc) => {
                                incomplete += 1;
                                tracing::info!(
                                    ts = inc.timestamp,
                                    missing_regions = inc.missing.len(),
                                    "incomplete frame"
                                );
                            }
                            Event::SequenceGap { lost, .. } => gaps += u64::from(lost),
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "push failed"),
            }
        }
    }

    for event in rx.flush() {
        if matches!(event, Event::Incomplete(_)) {
            incomplete += 1;
        }
    }

    println!(
        "frames {}  packets {}  dropped {}  complete {}  incomplete {}  lost-in-gaps {}",
        args.frames, sent_packets, dropped, complete, incomplete, gaps
    );
}
