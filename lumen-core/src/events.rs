//! Event types emitted to presentation-layer subscribers.
//!
//! ## Subscriptions
//!
//! | Event | Subscription |
//! |-------|--------------|
//! | `DetectionEvent` | `LumenEngine::subscribe_detections` |
//! | `FrameActivityEvent` | `LumenEngine::subscribe_activity` |
//! | `EngineStatusEvent` | `LumenEngine::subscribe_status` |
//! | `LanguageChangedEvent` | `LumenEngine::subscribe_language` |
//!
//! All types serialize camelCase so a host UI can forward them verbatim.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Detection events
// ---------------------------------------------------------------------------

/// Emitted once per classified frame with the outcome of the analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Producer-assigned sequence number of the frame that was analyzed.
    pub frame_seq: u64,
    /// What the analysis concluded.
    pub outcome: DetectionOutcome,
}

/// Terminal outcome of one classifier pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum DetectionOutcome {
    /// A priority object cleared the relevance and confidence filters.
    Detected(Detection),
    /// The classifier returned nothing relevant for this frame.
    NoneDetected,
    /// The classifier call failed; the pipeline keeps running.
    Error { message: String },
}

/// A single announced object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Classifier label text, verbatim.
    pub label: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f32,
    /// Normalized region the announcement refers to.
    pub bounding_box: BoundingBox,
}

/// Axis-aligned box in normalized frame coordinates ([0.0, 1.0] per axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// A box of the given fractional size centered in the frame.
    ///
    /// Label-only classifiers return no geometry, so announcements use the
    /// central half-frame box: `BoundingBox::centered(0.5, 0.5)`.
    pub fn centered(width: f32, height: f32) -> Self {
        Self {
            x: (1.0 - width) / 2.0,
            y: (1.0 - height) / 2.0,
            width,
            height,
        }
    }

    /// Center point of the box, `(cx, cy)` in normalized coordinates.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Frame activity events
// ---------------------------------------------------------------------------

/// Emitted for every submitted frame with its sampling disposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Producer-assigned sequence number of the frame.
    pub frame_seq: u64,
    /// What the submission path did with the frame.
    pub disposition: FrameDisposition,
}

/// Fate of a submitted frame before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameDisposition {
    /// Handed to the classifier worker.
    Dispatched,
    /// Released without analysis — not on the sampling cadence.
    SkippedCadence,
    /// Released without analysis — a classifier call was already in flight.
    SkippedBusy,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the Lumen engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Warming up the classifier and speech backends.
    WarmingUp,
    /// Accepting frames and announcing detections.
    Watching,
    /// Frame intake stopped; engine may be restarted.
    Stopped,
    /// Unrecoverable error — restart required.
    Error,
}

// ---------------------------------------------------------------------------
// Language events
// ---------------------------------------------------------------------------

/// Emitted after a successful output-language switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageChangedEvent {
    /// ISO 639-1 code now active on the speech engine.
    pub code: String,
    /// Human-readable language name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_event_serializes_with_camel_case_and_tagged_kind() {
        let event = DetectionEvent {
            seq: 7,
            frame_seq: 21,
            outcome: DetectionOutcome::Detected(Detection {
                label: "Dog".into(),
                confidence: 0.87,
                bounding_box: BoundingBox::centered(0.5, 0.5),
            }),
        };

        let json = serde_json::to_value(&event).expect("serialize detection event");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["frameSeq"], 21);
        assert_eq!(json["outcome"]["kind"], "detected");
        assert_eq!(json["outcome"]["label"], "Dog");
        let conf = json["outcome"]["confidence"]
            .as_f64()
            .expect("confidence should serialize as number");
        assert!((conf - 0.87).abs() < 1e-5);
        let bx = json["outcome"]["boundingBox"]["x"]
            .as_f64()
            .expect("box x should serialize as number");
        assert!((bx - 0.25).abs() < 1e-5);

        let round_trip: DetectionEvent =
            serde_json::from_value(json).expect("deserialize detection event");
        assert_eq!(round_trip.frame_seq, 21);
        match round_trip.outcome {
            DetectionOutcome::Detected(d) => {
                assert_eq!(d.label, "Dog");
                assert_eq!(d.bounding_box, BoundingBox::centered(0.5, 0.5));
            }
            other => panic!("expected detected outcome, got {other:?}"),
        }
    }

    #[test]
    fn none_and_error_outcomes_serialize_with_camel_case_kind() {
        let none = DetectionEvent {
            seq: 1,
            frame_seq: 3,
            outcome: DetectionOutcome::NoneDetected,
        };
        let json = serde_json::to_value(&none).expect("serialize none outcome");
        assert_eq!(json["outcome"]["kind"], "noneDetected");

        let error = DetectionEvent {
            seq: 2,
            frame_seq: 6,
            outcome: DetectionOutcome::Error {
                message: "labeler unavailable".into(),
            },
        };
        let json = serde_json::to_value(&error).expect("serialize error outcome");
        assert_eq!(json["outcome"]["kind"], "error");
        assert_eq!(json["outcome"]["message"], "labeler unavailable");
    }

    #[test]
    fn frame_activity_event_serializes_with_camel_case_fields() {
        let event = FrameActivityEvent {
            seq: 3,
            frame_seq: 9,
            disposition: FrameDisposition::SkippedBusy,
        };

        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["frameSeq"], 9);
        assert_eq!(json["disposition"], "skippedBusy");

        let round_trip: FrameActivityEvent =
            serde_json::from_value(json).expect("deserialize activity event");
        assert_eq!(round_trip.disposition, FrameDisposition::SkippedBusy);
    }

    #[test]
    fn frame_disposition_rejects_pascal_case() {
        let invalid = r#""SkippedCadence""#;
        let err = serde_json::from_str::<FrameDisposition>(invalid);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Watching,
            detail: None,
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "watching");
        assert_eq!(json["detail"], serde_json::Value::Null);

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Watching);
    }

    #[test]
    fn bounding_box_center_is_midpoint() {
        let along_center = BoundingBox::centered(0.5, 0.5).center();
        assert!((along_center.0 - 0.5).abs() < 1e-6);
        assert!((along_center.1 - 0.5).abs() < 1e-6);

        let corner = BoundingBox {
            x: 0.0,
            y: 0.5,
            width: 0.2,
            height: 0.4,
        };
        let (cx, cy) = corner.center();
        assert!((cx - 0.1).abs() < 1e-6);
        assert!((cy - 0.7).abs() < 1e-6);
    }
}
