//! Observer-style delivery of detection outcomes.
//!
//! Broadcast subscriptions suit event-loop consumers; callers that just want
//! callbacks attach a [`DetectionObserver`] instead. A forwarding thread owns
//! the receiver and marshals every outcome into the observer's methods, so
//! observer code never runs on the classifier worker.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{BoundingBox, DetectionEvent, DetectionOutcome};

/// Callbacks for per-frame detection outcomes, one method per outcome.
///
/// Methods take `&self`; implementations that mutate state use interior
/// mutability, since calls arrive from the forwarding thread.
pub trait DetectionObserver: Send + 'static {
    /// A priority object cleared the confidence and relevance filters.
    fn on_detected(&self, label: &str, confidence: f32, bounding_box: &BoundingBox);

    /// The frame was analyzed and nothing relevant was found.
    fn on_none_detected(&self);

    /// Classification failed for one frame; the pipeline keeps running.
    fn on_error(&self, message: &str);
}

/// Forward detection events to `observer` on a dedicated thread.
///
/// The thread exits when every sender is dropped. A lagged receiver skips
/// the missed events and keeps going.
pub fn forward_detections<O: DetectionObserver>(
    mut rx: broadcast::Receiver<DetectionEvent>,
    observer: O,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        match rx.blocking_recv() {
            Ok(event) => match event.outcome {
                DetectionOutcome::Detected(d) => {
                    observer.on_detected(&d.label, d.confidence, &d.bounding_box)
                }
                DetectionOutcome::NoneDetected => observer.on_none_detected(),
                DetectionOutcome::Error { message } => observer.on_error(&message),
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "detection observer lagging — events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("detection channel closed — observer thread exiting");
                return;
            }
        }
    })
}
