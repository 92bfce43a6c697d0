//! `StubClassifier` — placeholder backend that rotates through canned scenes
//! without real inference.
//!
//! Used during development and by the soak binary so the full pipeline
//! (sampling, filtering, speech, events) can be exercised end-to-end with no
//! model assets.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::classify::{ImageClassifier, Label};
use crate::error::Result;
use crate::frame::Frame;

/// Rotating-scene stub classifier.
///
/// Each call returns the next scene in the rotation. The default rotation
/// mixes relevant objects, an irrelevant label, and an empty frame so every
/// pipeline outcome gets exercised.
pub struct StubClassifier {
    scenes: Vec<Vec<Label>>,
    cursor: AtomicUsize,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::with_scenes(vec![
            vec![Label::new("Chair", 0.91), Label::new("Table", 0.78)],
            vec![Label::new("Person", 0.88)],
            vec![Label::new("Sky", 0.95)],
            vec![Label::new("Laptop", 0.83), Label::new("Keyboard", 0.71)],
            vec![],
            vec![Label::new("Bottle", 0.76), Label::new("Cup", 0.74)],
        ])
    }

    /// Build a stub that rotates through the given scenes.
    pub fn with_scenes(scenes: Vec<Vec<Label>>) -> Self {
        Self {
            scenes,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for StubClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageClassifier for StubClassifier {
    fn warm_up(&self) -> Result<()> {
        debug!("StubClassifier::warm_up — no-op");
        Ok(())
    }

    fn classify(&self, frame: &Frame) -> Result<Vec<Label>> {
        if self.scenes.is_empty() {
            return Ok(vec![]);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.scenes.len();
        let labels = self.scenes[index].clone();
        debug!(
            frame_seq = frame.seq(),
            scene = index,
            labels = labels.len(),
            "stub classify"
        );
        Ok(labels)
    }
}
