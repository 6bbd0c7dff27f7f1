//! Pace File Example
//!
//! Paces a raw s16le PCM file into a sink that only logs frames, and prints
//! every stream event until playback finishes.
//!
//! Usage: cargo run --example pace_file -- <file.raw> [sample_rate] [channels]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use groupcall_rtc::{AudioOptions, LocalTrack, MediaFrame, MediaKind, MediaSink, SinkError, Stream, StreamEvent, StreamOptions, TrackSink};

/// Counts frames and forwards nothing
struct LoggingSink {
    frames: AtomicU64,
    started: Instant,
    track: TrackSink,
}

#[async_trait]
impl MediaSink for LoggingSink {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    async fn push(&self, frame: MediaFrame) -> Result<(), SinkError> {
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 100 == 0 {
            if let MediaFrame::Audio(audio) = &frame {
                let peak = audio.samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
                log::info!(
                    "frame {} at {:.2}s, peak {}",
                    count,
                    self.started.elapsed().as_secs_f64(),
                    peak
                );
            }
        }
        Ok(())
    }

    fn track(&self) -> LocalTrack {
        self.track.track()
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("Usage: pace_file <file.raw> [sample_rate] [channels]");
        return;
    };
    let sample_rate = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(48000);
    let channel_count = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(2);

    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            return;
        }
    };

    println!("groupcall-rtc Pace File");
    println!("=======================");
    println!("File: {}", path);
    println!("Format: s16le, {} Hz, {} channel(s)", sample_rate, channel_count);
    println!();

    let sink = Arc::new(LoggingSink {
        frames: AtomicU64::new(0),
        started: Instant::now(),
        track: TrackSink::pcmu("audio", "pace-file"),
    });
    let options = StreamOptions::audio(AudioOptions {
        bits_per_sample: 16,
        sample_rate,
        channel_count,
    });

    let stream = match Stream::new(options, sink.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Failed to create stream: {}", e);
            return;
        }
    };
    let mut events = stream.subscribe();
    if let Err(e) = stream.attach_source(file) {
        eprintln!("Failed to attach source: {}", e);
        return;
    }

    while let Some(event) = events.recv().await {
        println!("event: {:?}", event);
        if event == StreamEvent::Finish {
            break;
        }
    }

    println!();
    println!(
        "Played {} frames in {:.2}s",
        sink.frames.load(Ordering::Relaxed),
        sink.started.elapsed().as_secs_f64()
    );
    stream.stop();
}
