fn main() {
    if let Err(e) = run() {
        eprintln!("soak failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use lumen_core::{
        ClassifierHandle, DetectionOutcome, EngineConfig, Frame, FrameDisposition, LumenEngine,
        SpeechHandle, StubClassifier, StubSynthesizer,
    };
    use serde::Serialize;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tracing_subscriber::EnvFilter;

    #[derive(Debug)]
    struct Args {
        frames: u64,
        fps: u32,
        every: u32,
        cooldown_ms: u64,
        cycle_every: Option<u64>,
        output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct LanguageVisit {
        frame: u64,
        code: String,
        name: String,
    }

    #[derive(Debug, Clone, Serialize)]
    struct Summary {
        frames_submitted: u64,
        fps: u32,
        sample_every_n_frames: u32,
        speech_cooldown_ms: u64,
        elapsed_ms: u64,
        frames_released: usize,
        dispatched: usize,
        skipped_cadence: usize,
        skipped_busy: usize,
        classify_calls: usize,
        classify_errors: usize,
        detected_events: usize,
        none_detected_events: usize,
        error_events: usize,
        utterances_spoken: usize,
        utterances_gated: usize,
        watchdog_resets: usize,
        languages_visited: Vec<LanguageVisit>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut frames: u64 = 120;
        let mut fps: u32 = 30;
        let mut every: u32 = 3;
        let mut cooldown_ms: u64 = 3_000;
        let mut cycle_every: Option<u64> = None;
        let mut output: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1).peekable();
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--frames" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --frames".into());
                    };
                    frames = v
                        .parse::<u64>()
                        .map_err(|_| "invalid value for --frames".to_string())?
                        .max(1);
                }
                "--fps" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --fps".into());
                    };
                    fps = v
                        .parse::<u32>()
                        .map_err(|_| "invalid value for --fps".to_string())?
                        .clamp(1, 240);
                }
                "--every" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --every".into());
                    };
                    every = v
                        .parse::<u32>()
                        .map_err(|_| "invalid value for --every".to_string())?;
                }
                "--cooldown-ms" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --cooldown-ms".into());
                    };
                    cooldown_ms = v
                        .parse::<u64>()
                        .map_err(|_| "invalid value for --cooldown-ms".to_string())?;
                }
                "--cycle-every" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --cycle-every".into());
                    };
                    cycle_every = Some(
                        v.parse::<u64>()
                            .map_err(|_| "invalid value for --cycle-every".to_string())?
                            .max(1),
                    );
                }
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p lumen-core --bin soak -- \\
  [--frames <n>] [--fps <n>] [--every <n>] [--cooldown-ms <n>] \\
  [--cycle-every <frames>] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        Ok(Args {
            frames,
            fps,
            every,
            cooldown_ms,
            cycle_every,
            output,
        })
    }

    let args = parse_args()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "lumen=info".parse().unwrap()),
        )
        .init();

    let mut config = EngineConfig::default();
    config.sample_every_n_frames = args.every;
    config.speech_cooldown = Duration::from_millis(args.cooldown_ms);
    let engine = LumenEngine::new(
        config,
        ClassifierHandle::new(StubClassifier::new()),
        SpeechHandle::new(StubSynthesizer::new()),
    );

    let mut detections = engine.subscribe_detections();
    let mut activity = engine.subscribe_activity();

    engine.warm_up().map_err(|e| e.to_string())?;
    engine.start().map_err(|e| e.to_string())?;

    println!(
        "Running Lumen soak: {} synthetic frames at {} fps (every={})",
        args.frames, args.fps, args.every
    );

    let released = Arc::new(AtomicUsize::new(0));
    let frame_gap = Duration::from_secs(1) / args.fps;
    let mut languages_visited = Vec::new();
    let started = Instant::now();

    for seq in 1..=args.frames {
        let hook = released.clone();
        let frame = Frame::new(seq, 640, 480, 0, vec![0u8; 64]).on_release(move || {
            hook.fetch_add(1, Ordering::Relaxed);
        });
        engine.submit_frame(frame);

        if let Some(cycle_every) = args.cycle_every {
            if seq % cycle_every == 0 {
                match engine.switch_language(None) {
                    Ok(switch) => languages_visited.push(LanguageVisit {
                        frame: seq,
                        code: switch.code,
                        name: switch.name,
                    }),
                    Err(e) => eprintln!("language cycle failed at frame {seq}: {e}"),
                }
            }
        }

        std::thread::sleep(frame_gap);
    }

    // Let the last in-flight classification finish before shutting down.
    std::thread::sleep(Duration::from_millis(150));
    let elapsed_ms = started.elapsed().as_millis() as u64;
    engine.stop().map_err(|e| e.to_string())?;

    let mut detected_events = 0usize;
    let mut none_detected_events = 0usize;
    let mut error_events = 0usize;
    while let Ok(event) = detections.try_recv() {
        match event.outcome {
            DetectionOutcome::Detected(_) => detected_events += 1,
            DetectionOutcome::NoneDetected => none_detected_events += 1,
            DetectionOutcome::Error { .. } => error_events += 1,
        }
    }

    let mut dispatched = 0usize;
    let mut skipped_cadence = 0usize;
    let mut skipped_busy = 0usize;
    while let Ok(event) = activity.try_recv() {
        match event.disposition {
            FrameDisposition::Dispatched => dispatched += 1,
            FrameDisposition::SkippedCadence => skipped_cadence += 1,
            FrameDisposition::SkippedBusy => skipped_busy += 1,
        }
    }

    let snapshot = engine.pipeline_diagnostics_snapshot();
    let summary = Summary {
        frames_submitted: args.frames,
        fps: args.fps,
        sample_every_n_frames: args.every,
        speech_cooldown_ms: args.cooldown_ms,
        elapsed_ms,
        frames_released: released.load(Ordering::Relaxed),
        dispatched,
        skipped_cadence,
        skipped_busy,
        classify_calls: snapshot.classify_calls,
        classify_errors: snapshot.classify_errors,
        detected_events,
        none_detected_events,
        error_events,
        utterances_spoken: snapshot.utterances_spoken,
        utterances_gated: snapshot.utterances_gated,
        watchdog_resets: snapshot.watchdog_resets,
        languages_visited,
    };

    println!(
        "Done. frames={} dispatched={} detections={} spoken={} gated={} released={}",
        summary.frames_submitted,
        summary.dispatched,
        summary.detected_events,
        summary.utterances_spoken,
        summary.utterances_gated,
        summary.frames_released
    );

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote soak report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
