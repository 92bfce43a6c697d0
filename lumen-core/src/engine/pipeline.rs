//! Frame-driven detection pipeline.
//!
//! ## Per-frame path
//!
//! ```text
//! 1. submit_frame (camera thread, non-blocking, no async runtime needed)
//! 2. Sampling cadence: only every Nth frame is eligible; others released
//! 3. In-flight ticket CAS: at most one classifier call at a time; losers
//!    released immediately (frames are never queued)
//! 4. Hand-off to the classifier worker thread (bounded channel, depth 1)
//! 5. Worker: classify → release frame → confidence + relevance filters →
//!    highest-confidence label → spatial phrase → cooldown gate → speak
//! 6. Broadcast DetectionEvent (detected / none / error) on every completion
//! ```
//!
//! The in-flight cell holds a *ticket*, not a boolean: resets compare against
//! the ticket they own, so a stale completion can never clear a slot that was
//! reclaimed and re-dispatched in the meantime. A lazy watchdog on the
//! submission path reclaims the cell when a classifier call hangs past the
//! configured limit and respawns the worker.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    classify::{ClassifierHandle, Label},
    engine::EngineConfig,
    events::{
        BoundingBox, Detection, DetectionEvent, DetectionOutcome, FrameActivityEvent,
        FrameDisposition,
    },
    frame::Frame,
    relevance::PriorityVocabulary,
    spatial,
    speech::{QueueMode, SpeechHandle},
};

pub struct PipelineDiagnostics {
    pub frames_in: AtomicUsize,
    pub frames_sampled: AtomicUsize,
    pub frames_skipped_busy: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub classify_errors: AtomicUsize,
    pub detections_emitted: AtomicUsize,
    pub none_detected: AtomicUsize,
    pub utterances_spoken: AtomicUsize,
    pub utterances_gated: AtomicUsize,
    pub watchdog_resets: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            frames_in: AtomicUsize::new(0),
            frames_sampled: AtomicUsize::new(0),
            frames_skipped_busy: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            classify_errors: AtomicUsize::new(0),
            detections_emitted: AtomicUsize::new(0),
            none_detected: AtomicUsize::new(0),
            utterances_spoken: AtomicUsize::new(0),
            utterances_gated: AtomicUsize::new(0),
            watchdog_resets: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.frames_in.store(0, Ordering::Relaxed);
        self.frames_sampled.store(0, Ordering::Relaxed);
        self.frames_skipped_busy.store(0, Ordering::Relaxed);
        self.classify_calls.store(0, Ordering::Relaxed);
        self.classify_errors.store(0, Ordering::Relaxed);
        self.detections_emitted.store(0, Ordering::Relaxed);
        self.none_detected.store(0, Ordering::Relaxed);
        self.utterances_spoken.store(0, Ordering::Relaxed);
        self.utterances_gated.store(0, Ordering::Relaxed);
        self.watchdog_resets.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_sampled: self.frames_sampled.load(Ordering::Relaxed),
            frames_skipped_busy: self.frames_skipped_busy.load(Ordering::Relaxed),
            classify_calls: self.classify_calls.load(Ordering::Relaxed),
            classify_errors: self.classify_errors.load(Ordering::Relaxed),
            detections_emitted: self.detections_emitted.load(Ordering::Relaxed),
            none_detected: self.none_detected.load(Ordering::Relaxed),
            utterances_spoken: self.utterances_spoken.load(Ordering::Relaxed),
            utterances_gated: self.utterances_gated.load(Ordering::Relaxed),
            watchdog_resets: self.watchdog_resets.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub frames_in: usize,
    pub frames_sampled: usize,
    pub frames_skipped_busy: usize,
    pub classify_calls: usize,
    pub classify_errors: usize,
    pub detections_emitted: usize,
    pub none_detected: usize,
    pub utterances_spoken: usize,
    pub utterances_gated: usize,
    pub watchdog_resets: usize,
}

/// Everything the pipeline needs, passed as one struct so construction sites
/// stay tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub classifier: ClassifierHandle,
    pub speech: SpeechHandle,
    pub detection_tx: broadcast::Sender<DetectionEvent>,
    pub activity_tx: broadcast::Sender<FrameActivityEvent>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// The in-flight cell holds this when no classifier call is running.
const TICKET_IDLE: u64 = 0;
/// `last_spoken_ms` holds this until the first announcement.
const NEVER_SPOKEN: u64 = 0;
/// Name of the classifier worker thread.
const WORKER_THREAD: &str = "lumen-classify";

/// Mutable state shared between the submission path and the classifier
/// worker.
struct PipelineState {
    /// Frames seen by `submit_frame`; drives the sampling cadence.
    frames_seen: AtomicU64,
    /// `TICKET_IDLE`, or the ticket of the in-flight classifier call.
    in_flight: AtomicU64,
    next_ticket: AtomicU64,
    /// Millisecond stamp of the in-flight dispatch; watchdog input.
    dispatched_at_ms: AtomicU64,
    /// Producer seq of the in-flight frame, for abandonment reports.
    in_flight_frame_seq: AtomicU64,
    /// Millisecond stamp of the last announcement; `NEVER_SPOKEN` initially.
    last_spoken_ms: AtomicU64,
    epoch: Instant,
}

impl PipelineState {
    fn new() -> Self {
        Self {
            frames_seen: AtomicU64::new(0),
            in_flight: AtomicU64::new(TICKET_IDLE),
            next_ticket: AtomicU64::new(0),
            dispatched_at_ms: AtomicU64::new(0),
            in_flight_frame_seq: AtomicU64::new(0),
            last_spoken_ms: AtomicU64::new(NEVER_SPOKEN),
            epoch: Instant::now(),
        }
    }

    /// Milliseconds since pipeline construction, offset by one so a zero
    /// stamp can mean "never".
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    /// Return the in-flight cell to idle, but only if `ticket` still owns it.
    fn release_ticket(&self, ticket: u64) {
        let _ = self.in_flight.compare_exchange(
            ticket,
            TICKET_IDLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Resets the in-flight cell when dropped, so the cell returns to idle on
/// every exit from the worker's frame scope — success, failure, and unwind.
struct TicketReset<'a> {
    state: &'a PipelineState,
    ticket: u64,
}

impl Drop for TicketReset<'_> {
    fn drop(&mut self) {
        self.state.release_ticket(self.ticket);
    }
}

struct ClassifyJob {
    ticket: u64,
    frame: Frame,
}

/// Context the worker thread runs with; cloneable so the watchdog can respawn
/// the worker with identical wiring.
#[derive(Clone)]
struct WorkerContext {
    classifier: ClassifierHandle,
    speech: SpeechHandle,
    vocabulary: Arc<PriorityVocabulary>,
    confidence_threshold: f32,
    speech_cooldown: Duration,
    state: Arc<PipelineState>,
    detection_tx: broadcast::Sender<DetectionEvent>,
    seq: Arc<AtomicU64>,
    diagnostics: Arc<PipelineDiagnostics>,
}

/// Push-driven detection pipeline.
///
/// `submit_frame` is safe to call from any plain thread; classification runs
/// on a dedicated worker so the caller never blocks on inference or speech.
pub struct DetectionPipeline {
    config: EngineConfig,
    state: Arc<PipelineState>,
    worker_ctx: WorkerContext,
    /// Replaced wholesale when the watchdog respawns the worker; `None` only
    /// during teardown.
    worker_tx: Mutex<Option<Sender<ClassifyJob>>>,
    activity_tx: broadcast::Sender<FrameActivityEvent>,
    activity_seq: AtomicU64,
    detection_tx: broadcast::Sender<DetectionEvent>,
    seq: Arc<AtomicU64>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl DetectionPipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        let PipelineContext {
            config,
            classifier,
            speech,
            detection_tx,
            activity_tx,
            seq,
            diagnostics,
        } = ctx;

        let state = Arc::new(PipelineState::new());
        let worker_ctx = WorkerContext {
            classifier,
            speech,
            vocabulary: Arc::new(PriorityVocabulary::new(config.priority_vocabulary.clone())),
            confidence_threshold: config.confidence_threshold,
            speech_cooldown: config.speech_cooldown,
            state: state.clone(),
            detection_tx: detection_tx.clone(),
            seq: seq.clone(),
            diagnostics: diagnostics.clone(),
        };

        let pipeline = Self {
            config,
            state,
            worker_ctx,
            worker_tx: Mutex::new(None),
            activity_tx,
            activity_seq: AtomicU64::new(0),
            detection_tx,
            seq,
            diagnostics,
        };
        pipeline.start_worker();

        info!(
            every = pipeline.config.sample_every_n_frames,
            cooldown_ms = pipeline.config.speech_cooldown.as_millis() as u64,
            threshold = pipeline.config.confidence_threshold,
            vocabulary = pipeline.worker_ctx.vocabulary.len(),
            "detection pipeline started"
        );
        pipeline
    }

    /// Offer one frame to the pipeline. Never blocks.
    ///
    /// The frame is released when this call returns unless it was dispatched,
    /// in which case the worker releases it as soon as classification
    /// finishes.
    pub fn submit_frame(&self, frame: Frame) {
        self.diagnostics.frames_in.fetch_add(1, Ordering::Relaxed);
        let count = self.state.frames_seen.fetch_add(1, Ordering::Relaxed) + 1;
        let frame_seq = frame.seq();

        // ── 1. Sampling cadence ──────────────────────────────────────────
        let every = u64::from(self.config.sample_every_n_frames.max(1));
        if count % every != 0 {
            self.emit_activity(frame_seq, FrameDisposition::SkippedCadence);
            return;
        }

        // ── 2. Lazy watchdog ─────────────────────────────────────────────
        self.reclaim_if_hung();

        // ── 3. In-flight ticket CAS ──────────────────────────────────────
        let ticket = self.state.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        if self
            .state
            .in_flight
            .compare_exchange(TICKET_IDLE, ticket, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.diagnostics
                .frames_skipped_busy
                .fetch_add(1, Ordering::Relaxed);
            debug!(frame_seq, "classifier busy — frame dropped");
            self.emit_activity(frame_seq, FrameDisposition::SkippedBusy);
            return;
        }
        self.state
            .in_flight_frame_seq
            .store(frame_seq, Ordering::Release);
        self.state
            .dispatched_at_ms
            .store(self.state.now_ms(), Ordering::Release);

        // ── 4. Hand off to the worker ────────────────────────────────────
        let sender = self.worker_tx.lock().clone();
        let Some(sender) = sender else {
            self.state.release_ticket(ticket);
            return;
        };
        if sender.send(ClassifyJob { ticket, frame }).is_err() {
            // Worker gone and not respawned yet; drop the frame rather than
            // queue it.
            self.state.release_ticket(ticket);
            warn!(frame_seq, "classifier worker unavailable — frame dropped");
            return;
        }
        self.diagnostics
            .frames_sampled
            .fetch_add(1, Ordering::Relaxed);
        self.emit_activity(frame_seq, FrameDisposition::Dispatched);
    }

    /// Reclaim the in-flight cell when its classifier call has outlived the
    /// watchdog limit, and put a fresh worker in place.
    ///
    /// The abandoned call keeps running inside the old worker; its result is
    /// discarded by ticket comparison when it finally lands, so delivery
    /// order is preserved.
    fn reclaim_if_hung(&self) {
        let Some(watchdog) = self.config.classify_watchdog else {
            return;
        };
        let ticket = self.state.in_flight.load(Ordering::Acquire);
        if ticket == TICKET_IDLE {
            return;
        }
        let dispatched_at = self.state.dispatched_at_ms.load(Ordering::Acquire);
        let stuck_ms = self.state.now_ms().saturating_sub(dispatched_at);
        if stuck_ms <= watchdog.as_millis() as u64 {
            return;
        }
        // The call may complete between the load and this CAS; losing the
        // race just means there is nothing to reclaim.
        if self
            .state
            .in_flight
            .compare_exchange(ticket, TICKET_IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.diagnostics
            .watchdog_resets
            .fetch_add(1, Ordering::Relaxed);
        let stale_seq = self.state.in_flight_frame_seq.load(Ordering::Acquire);
        warn!(
            ticket,
            frame_seq = stale_seq,
            stuck_ms,
            "classifier call exceeded the watchdog limit — abandoning it"
        );
        emit_detection(
            &self.detection_tx,
            &self.seq,
            stale_seq,
            DetectionOutcome::Error {
                message: format!("classifier call abandoned after {stuck_ms}ms"),
            },
        );
        self.start_worker();
    }

    /// Install a fresh worker thread and hand-off channel. Replacing the
    /// sender closes the old channel, so an abandoned worker exits as soon as
    /// its blocked call returns.
    fn start_worker(&self) {
        let (tx, rx) = bounded(1);
        let ctx = self.worker_ctx.clone();
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn(move || run_worker(rx, ctx));
        match spawned {
            Ok(_) => {
                *self.worker_tx.lock() = Some(tx);
            }
            Err(e) => {
                error!(error = %e, "failed to spawn classifier worker");
                *self.worker_tx.lock() = None;
            }
        }
    }

    fn emit_activity(&self, frame_seq: u64, disposition: FrameDisposition) {
        let seq = self.activity_seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.activity_tx.send(FrameActivityEvent {
            seq,
            frame_seq,
            disposition,
        });
    }
}

impl Drop for DetectionPipeline {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the in-flight job and
        // exit; the thread is detached so a slow classifier never blocks the
        // dropping context.
        self.worker_tx.get_mut().take();
        let snapshot = self.diagnostics.snapshot();
        info!(
            frames_in = snapshot.frames_in,
            sampled = snapshot.frames_sampled,
            busy_skips = snapshot.frames_skipped_busy,
            detections = snapshot.detections_emitted,
            spoken = snapshot.utterances_spoken,
            "detection pipeline stopped"
        );
    }
}

impl std::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn run_worker(rx: Receiver<ClassifyJob>, ctx: WorkerContext) {
    debug!("classifier worker started");
    for job in rx.iter() {
        let handled = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            classify_frame(&ctx, job)
        }));
        if handled.is_err() {
            // The ticket guard and the frame's Drop both ran during unwind;
            // the pipeline stays live for the next frame.
            error!("frame handler panicked — continuing");
        }
    }
    debug!("classifier worker exiting");
}

fn classify_frame(ctx: &WorkerContext, job: ClassifyJob) {
    let ClassifyJob { ticket, frame } = job;
    let _reset = TicketReset {
        state: &ctx.state,
        ticket,
    };
    let frame_seq = frame.seq();

    ctx.diagnostics.classify_calls.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();
    let result = ctx.classifier.0.classify(&frame);
    // Return the buffer to its source before any reporting happens.
    drop(frame);
    debug!(
        frame_seq,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "classify finished"
    );

    if ctx.state.in_flight.load(Ordering::Acquire) != ticket {
        warn!(
            ticket,
            frame_seq, "result arrived after the watchdog reclaimed this call — discarded"
        );
        return;
    }

    match result {
        Ok(labels) => handle_labels(ctx, frame_seq, labels),
        Err(e) => {
            ctx.diagnostics.classify_errors.fetch_add(1, Ordering::Relaxed);
            error!(frame_seq, error = %e, "classifier failed");
            emit_detection(
                &ctx.detection_tx,
                &ctx.seq,
                frame_seq,
                DetectionOutcome::Error {
                    message: e.to_string(),
                },
            );
        }
    }
}

fn handle_labels(ctx: &WorkerContext, frame_seq: u64, labels: Vec<Label>) {
    let total = labels.len();
    let Some(label) = select_best(labels, ctx.confidence_threshold, &ctx.vocabulary) else {
        ctx.diagnostics.none_detected.fetch_add(1, Ordering::Relaxed);
        debug!(frame_seq, labels = total, "no relevant objects");
        emit_detection(
            &ctx.detection_tx,
            &ctx.seq,
            frame_seq,
            DetectionOutcome::NoneDetected,
        );
        return;
    };

    // Label-only classifiers return no geometry, so announcements use the
    // central half-frame box.
    let bounding_box = BoundingBox::centered(0.5, 0.5);

    if try_claim_speech_slot(&ctx.state, ctx.speech_cooldown) {
        let text = spatial::announcement(&label.text, &bounding_box);
        let utterance_id = format!("det-{frame_seq}");
        info!(frame_seq, utterance = %utterance_id, confidence = label.confidence, "speaking: {text}");
        match ctx
            .speech
            .0
            .lock()
            .speak(&text, QueueMode::Flush, &utterance_id)
        {
            Ok(()) => {
                ctx.diagnostics
                    .utterances_spoken
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(frame_seq, error = %e, "announcement could not be spoken"),
        }
    } else {
        ctx.diagnostics
            .utterances_gated
            .fetch_add(1, Ordering::Relaxed);
        debug!(frame_seq, label = %label.text, "cooldown active — announcement suppressed");
    }

    // Subscribers hear about the detection whether or not it was announced.
    ctx.diagnostics
        .detections_emitted
        .fetch_add(1, Ordering::Relaxed);
    emit_detection(
        &ctx.detection_tx,
        &ctx.seq,
        frame_seq,
        DetectionOutcome::Detected(Detection {
            label: label.text,
            confidence: label.confidence,
            bounding_box,
        }),
    );
}

/// Apply the confidence floor and relevance filter, then pick the highest-
/// confidence survivor. Strict `>` keeps the earliest label on ties, so the
/// selection is stable in the classifier's own ordering.
fn select_best(
    labels: Vec<Label>,
    threshold: f32,
    vocabulary: &PriorityVocabulary,
) -> Option<Label> {
    labels
        .into_iter()
        .filter(|label| label.confidence >= threshold && vocabulary.is_relevant(&label.text))
        .reduce(|best, candidate| {
            if candidate.confidence > best.confidence {
                candidate
            } else {
                best
            }
        })
}

/// Claim the right to speak, rate-limited by the cooldown.
///
/// The stamp moves by CAS so the gate stays race-free even if completions
/// ever overlap (e.g. a stale call racing its replacement).
fn try_claim_speech_slot(state: &PipelineState, cooldown: Duration) -> bool {
    let cooldown_ms = cooldown.as_millis() as u64;
    let now = state.now_ms();
    loop {
        let last = state.last_spoken_ms.load(Ordering::Acquire);
        if last != NEVER_SPOKEN && now.saturating_sub(last) < cooldown_ms {
            return false;
        }
        if state
            .last_spoken_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return true;
        }
    }
}

fn emit_detection(
    tx: &broadcast::Sender<DetectionEvent>,
    seq: &AtomicU64,
    frame_seq: u64,
    outcome: DetectionOutcome,
) {
    let seq = seq.fetch_add(1, Ordering::Relaxed);
    let _ = tx.send(DetectionEvent {
        seq,
        frame_seq,
        outcome,
    });
}
