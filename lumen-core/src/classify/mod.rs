//! Image classifier abstraction.
//!
//! The `ImageClassifier` trait decouples the pipeline from any specific
//! backend (stub rotation, on-device labeler, remote model, etc.).
//!
//! `classify` takes `&self` intentionally: when a hung call is abandoned by
//! the pipeline watchdog, a fresh call starts while the stale one may still
//! be draining inside the backend. A shared receiver keeps the fresh call
//! from serialising behind the stale one; stateful backends use interior
//! mutability and must tolerate that rare overlap.

pub mod stub;

use std::sync::Arc;

use crate::error::Result;
use crate::frame::Frame;

/// A single label hypothesis for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Classifier label text, verbatim.
    pub text: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f32,
}

impl Label {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Contract for image classification backends.
pub trait ImageClassifier: Send + Sync + 'static {
    /// One-time warm-up: load weights, allocate buffers, run a dummy pass.
    /// Called once at engine startup.
    ///
    /// # Errors
    /// Returns an error if model assets are missing or corrupt.
    fn warm_up(&self) -> Result<()>;

    /// Produce label hypotheses for one frame.
    ///
    /// May be empty if nothing was recognised. Backends are free to apply
    /// their own confidence floor; the pipeline applies the configured
    /// threshold regardless.
    fn classify(&self, frame: &Frame) -> Result<Vec<Label>>;
}

/// Thread-safe reference-counted handle to any `ImageClassifier` implementor.
#[derive(Clone)]
pub struct ClassifierHandle(pub Arc<dyn ImageClassifier>);

impl ClassifierHandle {
    /// Wrap any `ImageClassifier` in a `ClassifierHandle`.
    pub fn new<C: ImageClassifier>(classifier: C) -> Self {
        Self(Arc::new(classifier))
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle").finish_non_exhaustive()
    }
}
