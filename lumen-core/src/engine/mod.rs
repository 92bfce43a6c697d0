//! `LumenEngine` — top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! LumenEngine::new()
//!     └─► warm_up()          → classifier + speech ready, status = WarmingUp → Idle
//!         └─► start()        → pipeline spawned, status = Watching
//!             └─► stop()     → running=false, pipeline dropped, status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state returns
//! an error rather than panicking.
//!
//! ## Threading
//!
//! The engine is `Send + Sync` — all fields use interior mutability — so the
//! camera thread can call `submit_frame` while a UI or control thread drives
//! the lifecycle and language switching. Classification itself runs on the
//! pipeline's worker thread; no method here blocks on inference.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    classify::ClassifierHandle,
    error::{LumenError, Result},
    events::{
        DetectionEvent, EngineStatus, EngineStatusEvent, FrameActivityEvent, LanguageChangedEvent,
    },
    frame::Frame,
    listener::{self, DetectionObserver},
    locale::{
        self,
        cycle::{LanguageCycler, LanguageSwitch},
    },
    speech::{QueueMode, SpeechHandle},
};

use pipeline::{DetectionPipeline, DiagnosticsSnapshot, PipelineContext, PipelineDiagnostics};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Spoken once when watching begins, so the user knows the engine is live.
const READY_UTTERANCE: &str = "Object detection ready";

/// Configuration for `LumenEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Analyze every Nth frame (1-indexed); the rest are released untouched.
    /// `0` is treated as `1` (analyze everything). Default: 3.
    pub sample_every_n_frames: u32,
    /// Minimum gap between spoken announcements. Detections inside the window
    /// still reach subscribers; only the utterance is suppressed.
    /// Default: 3000 ms.
    pub speech_cooldown: Duration,
    /// Labels below this confidence are ignored, in [0, 1]. Default: 0.5.
    pub confidence_threshold: f32,
    /// Keywords that make a label worth announcing (case-insensitive
    /// substring match in either direction). Empty means nothing is ever
    /// relevant. Default: the curated household/navigation list.
    pub priority_vocabulary: Vec<String>,
    /// Ordered language sequence for cycle-mode switching.
    /// Default: `[en, te, hi, ta, ml, ko, ja]`.
    pub language_cycle: Vec<String>,
    /// How long a classifier call may run before the pipeline abandons it and
    /// respawns the worker. `None` disables the watchdog. Default: 10 s.
    pub classify_watchdog: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_every_n_frames: 3,
            speech_cooldown: Duration::from_millis(3_000),
            confidence_threshold: 0.5,
            priority_vocabulary: crate::relevance::PriorityVocabulary::default_terms(),
            language_cycle: locale::default_cycle(),
            classify_watchdog: Some(Duration::from_secs(10)),
        }
    }
}

/// The top-level engine handle.
///
/// `LumenEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<LumenEngine>` to share between the camera thread and
/// event-forwarding tasks.
pub struct LumenEngine {
    config: EngineConfig,
    classifier: ClassifierHandle,
    speech: SpeechHandle,
    cycler: LanguageCycler,
    /// Present while watching; dropping it shuts the worker down.
    pipeline: Mutex<Option<Arc<DetectionPipeline>>>,
    /// `true` while the pipeline is accepting frames.
    running: Arc<AtomicBool>,
    /// Set by a successful `warm_up()`.
    ready: AtomicBool,
    /// Canonical status (written atomically via Mutex, read from commands).
    status: Arc<Mutex<EngineStatus>>,
    /// Broadcast sender for per-frame detection outcomes.
    detection_tx: broadcast::Sender<DetectionEvent>,
    /// Broadcast sender for frame disposition events.
    activity_tx: broadcast::Sender<FrameActivityEvent>,
    /// Broadcast sender for status events.
    status_tx: broadcast::Sender<EngineStatusEvent>,
    /// Broadcast sender for language switch confirmations.
    language_tx: broadcast::Sender<LanguageChangedEvent>,
    /// Monotonically increasing event sequence counter.
    seq: Arc<AtomicU64>,
    /// Shared pipeline diagnostics counters.
    diagnostics: Arc<PipelineDiagnostics>,
}

impl LumenEngine {
    /// Create a new engine. Does not analyze anything — call `warm_up()` then
    /// `start()`.
    ///
    /// Both ports are injected fully constructed; the engine never reaches
    /// into ambient state to find them.
    pub fn new(config: EngineConfig, classifier: ClassifierHandle, speech: SpeechHandle) -> Self {
        let (detection_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (activity_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (language_tx, _) = broadcast::channel(BROADCAST_CAP);
        let cycler = LanguageCycler::new(speech.clone(), config.language_cycle.clone());
        let diagnostics = Arc::new(PipelineDiagnostics::default());

        Self {
            config,
            classifier,
            speech,
            cycler,
            pipeline: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            ready: AtomicBool::new(false),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            detection_tx,
            activity_tx,
            status_tx,
            language_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics,
        }
    }

    /// Warm up both ports: load the classifier and initialize the speech
    /// backend.
    ///
    /// Call once at application startup, before `start()`.
    pub fn warm_up(&self) -> Result<()> {
        self.set_status(EngineStatus::WarmingUp, None);
        info!("warming up classifier");
        self.classifier.0.warm_up()?;
        info!("initializing speech backend");
        {
            let mut speech = self.speech.0.lock();
            speech.initialize()?;
            if !speech.is_ready() {
                return Err(LumenError::SpeechNotReady);
            }
        }
        self.ready.store(true, Ordering::SeqCst);
        self.set_status(EngineStatus::Idle, None);
        info!("engine warm — ready to start");
        Ok(())
    }

    /// Start watching: spawn the detection pipeline and announce readiness.
    ///
    /// # Errors
    /// - `LumenError::SpeechNotReady` if `warm_up()` has not succeeded.
    /// - `LumenError::AlreadyRunning` if already started.
    pub fn start(&self) -> Result<()> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(LumenError::SpeechNotReady);
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(LumenError::AlreadyRunning);
        }

        self.diagnostics.reset();
        let pipeline = Arc::new(DetectionPipeline::new(PipelineContext {
            config: self.config.clone(),
            classifier: self.classifier.clone(),
            speech: self.speech.clone(),
            detection_tx: self.detection_tx.clone(),
            activity_tx: self.activity_tx.clone(),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        }));
        *self.pipeline.lock() = Some(pipeline);
        self.running.store(true, Ordering::SeqCst);
        self.set_status(EngineStatus::Watching, None);

        // The readiness announcement goes straight to the speech port; it is
        // not a detection, so it never stamps the cooldown.
        if let Err(e) =
            self.speech
                .0
                .lock()
                .speak(READY_UTTERANCE, QueueMode::Flush, "init_ready")
        {
            warn!(error = %e, "readiness announcement failed");
        }

        info!("engine started — watching");
        Ok(())
    }

    /// Stop watching: drop the pipeline and stop accepting frames.
    ///
    /// The in-flight classifier call, if any, finishes on the detached worker
    /// and its result is discarded with the channel.
    ///
    /// # Errors
    /// - `LumenError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(LumenError::NotRunning);
        }

        self.running.store(false, Ordering::SeqCst);
        self.pipeline.lock().take();
        self.set_status(EngineStatus::Stopped, None);
        info!("engine stopped");
        Ok(())
    }

    /// Offer one camera frame. Never blocks; safe from any thread.
    ///
    /// Frames offered while the engine is not running are released untouched.
    pub fn submit_frame(&self, frame: Frame) {
        if !self.running.load(Ordering::SeqCst) {
            debug!(frame_seq = frame.seq(), "engine not running — frame dropped");
            return;
        }
        let pipeline = self.pipeline.lock().clone();
        let Some(pipeline) = pipeline else {
            return;
        };
        pipeline.submit_frame(frame);
    }

    /// Switch the spoken-output language.
    ///
    /// With `Some(code)` the request is explicit: it either applies or fails
    /// with `LanguageUnavailable` — no fallback. With `None` the engine
    /// advances through the configured cycle, skipping languages the speech
    /// backend refuses, and fails with `LanguageCycleExhausted` only when no
    /// candidate works.
    ///
    /// Works in every lifecycle state once the speech backend is initialized;
    /// language is independent of the frame loop.
    pub fn switch_language(&self, code: Option<&str>) -> Result<LanguageSwitch> {
        let switch = match code {
            Some(code) => self.cycler.switch_to(code)?,
            None => self.cycler.cycle()?,
        };
        let _ = self.language_tx.send(LanguageChangedEvent {
            code: switch.code.clone(),
            name: switch.name.clone(),
        });
        Ok(switch)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to per-frame detection outcomes.
    pub fn subscribe_detections(&self) -> broadcast::Receiver<DetectionEvent> {
        self.detection_tx.subscribe()
    }

    /// Subscribe to frame disposition events (dispatched / skipped).
    pub fn subscribe_activity(&self) -> broadcast::Receiver<FrameActivityEvent> {
        self.activity_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribe to language switch confirmations.
    pub fn subscribe_language(&self) -> broadcast::Receiver<LanguageChangedEvent> {
        self.language_tx.subscribe()
    }

    /// Spawn a thread that forwards detection outcomes to `observer`.
    ///
    /// The thread exits when the engine is dropped (the broadcast channel
    /// closes) or when the returned handle's receiver lags out entirely.
    pub fn attach_observer<O: DetectionObserver>(&self, observer: O) -> std::thread::JoinHandle<()> {
        listener::forward_detections(self.subscribe_detections(), observer)
    }

    /// Snapshot of pipeline counters for observability.
    pub fn pipeline_diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl std::fmt::Debug for LumenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumenEngine")
            .field("config", &self.config)
            .field("status", &*self.status.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use crate::classify::stub::StubClassifier;
    use crate::classify::ImageClassifier;
    use crate::error::Result;
    use crate::speech::{SetLanguageOutcome, SpeechSynthesizer};

    /// Synthesizer that journals utterances and tracks initialization.
    struct JournalSynth {
        ready: bool,
        language: String,
        spoken: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl JournalSynth {
        fn new() -> (Self, Arc<Mutex<Vec<(String, String)>>>) {
            let spoken = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    ready: false,
                    language: "en".to_string(),
                    spoken: spoken.clone(),
                },
                spoken,
            )
        }
    }

    impl SpeechSynthesizer for JournalSynth {
        fn initialize(&mut self) -> Result<()> {
            self.ready = true;
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn speak(&mut self, text: &str, _mode: QueueMode, utterance_id: &str) -> Result<()> {
            if !self.ready {
                return Err(LumenError::SpeechNotReady);
            }
            self.spoken
                .lock()
                .push((utterance_id.to_string(), text.to_string()));
            Ok(())
        }

        fn stop(&mut self) {}

        fn set_language(&mut self, code: &str) -> SetLanguageOutcome {
            self.language = code.to_string();
            SetLanguageOutcome::Applied
        }

        fn is_language_available(&self, _code: &str) -> bool {
            true
        }

        fn current_language(&self) -> String {
            self.language.clone()
        }
    }

    fn ready_engine() -> (LumenEngine, Arc<Mutex<Vec<(String, String)>>>) {
        let (synth, spoken) = JournalSynth::new();
        let engine = LumenEngine::new(
            EngineConfig::default(),
            ClassifierHandle::new(StubClassifier::new()),
            SpeechHandle::new(synth),
        );
        (engine, spoken)
    }

    #[test]
    fn lifecycle_happy_path_announces_readiness() {
        let (engine, spoken) = ready_engine();
        let mut status_rx = engine.subscribe_status();

        engine.warm_up().expect("warm up");
        engine.start().expect("start");
        assert_eq!(engine.status(), EngineStatus::Watching);
        engine.stop().expect("stop");
        assert_eq!(engine.status(), EngineStatus::Stopped);

        let spoken = spoken.lock();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].0, "init_ready");
        assert_eq!(spoken[0].1, "Object detection ready");

        let mut statuses = Vec::new();
        while let Ok(ev) = status_rx.try_recv() {
            statuses.push(ev.status);
        }
        assert_eq!(
            statuses,
            [
                EngineStatus::WarmingUp,
                EngineStatus::Idle,
                EngineStatus::Watching,
                EngineStatus::Stopped,
            ]
        );
    }

    #[test]
    fn start_before_warm_up_is_rejected() {
        let (engine, _) = ready_engine();
        assert!(matches!(engine.start(), Err(LumenError::SpeechNotReady)));
    }

    #[test]
    fn double_start_and_stray_stop_are_rejected() {
        let (engine, _) = ready_engine();
        engine.warm_up().expect("warm up");
        engine.start().expect("start");
        assert!(matches!(engine.start(), Err(LumenError::AlreadyRunning)));
        engine.stop().expect("stop");
        assert!(matches!(engine.stop(), Err(LumenError::NotRunning)));
    }

    #[test]
    fn frames_submitted_while_stopped_are_released_unclassified() {
        struct CountingClassifier {
            calls: Arc<AtomicUsize>,
        }

        impl ImageClassifier for CountingClassifier {
            fn warm_up(&self) -> Result<()> {
                Ok(())
            }

            fn classify(&self, _frame: &Frame) -> Result<Vec<crate::classify::Label>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let (synth, _) = JournalSynth::new();
        let engine = LumenEngine::new(
            EngineConfig::default(),
            ClassifierHandle::new(CountingClassifier {
                calls: calls.clone(),
            }),
            SpeechHandle::new(synth),
        );
        engine.warm_up().expect("warm up");

        let releases = Arc::new(AtomicUsize::new(0));
        let hook = releases.clone();
        let frame = Frame::new(1, 64, 64, 0, vec![0u8; 8])
            .on_release(move || {
                hook.fetch_add(1, Ordering::SeqCst);
            });
        engine.submit_frame(frame);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn switch_language_emits_a_confirmation_event() {
        let (engine, spoken) = ready_engine();
        engine.warm_up().expect("warm up");
        let mut language_rx = engine.subscribe_language();

        let switch = engine.switch_language(None).expect("cycle");
        assert_eq!(switch.code, "te");
        assert_eq!(switch.name, "Telugu");

        let event = language_rx.try_recv().expect("language event");
        assert_eq!(event.code, "te");
        assert_eq!(event.name, "Telugu");

        let spoken = spoken.lock();
        assert!(spoken.iter().any(|(_, text)| text == "Switched to Telugu"));
    }

    #[test]
    fn explicit_switch_to_named_language_works_while_watching() {
        let (engine, _) = ready_engine();
        engine.warm_up().expect("warm up");
        engine.start().expect("start");

        let switch = engine.switch_language(Some("ko")).expect("explicit switch");
        assert_eq!(switch.code, "ko");
        assert_eq!(switch.name, "Korean");

        engine.stop().expect("stop");
    }
}
