//! # lumen-core
//!
//! Reusable sight-to-speech engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Camera → submit_frame → sampling + in-flight ticket → worker thread
//!                                                            │
//!                                              ImageClassifier::classify
//!                                                            │
//!                                    confidence / relevance filter + ranking
//!                                                            │
//!                          spatial phrase → cooldown gate → SpeechSynthesizer
//!                                                            │
//!                                        broadcast::Sender<DetectionEvent>
//! ```
//!
//! The submission path is non-blocking and allocation-light. All heavy work
//! happens on the classifier worker thread.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod classify;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod listener;
pub mod locale;
pub mod relevance;
pub mod spatial;
pub mod speech;

// Convenience re-exports for downstream crates
pub use classify::{stub::StubClassifier, ClassifierHandle, ImageClassifier, Label};
pub use engine::pipeline::{DetectionPipeline, DiagnosticsSnapshot, PipelineDiagnostics};
pub use engine::{EngineConfig, LumenEngine};
pub use error::LumenError;
pub use events::{
    BoundingBox, Detection, DetectionEvent, DetectionOutcome, EngineStatus, EngineStatusEvent,
    FrameActivityEvent, FrameDisposition, LanguageChangedEvent,
};
pub use frame::Frame;
pub use listener::DetectionObserver;
pub use locale::{LanguageCycler, LanguageSwitch};
pub use relevance::PriorityVocabulary;
pub use speech::{
    stub::StubSynthesizer, QueueMode, SetLanguageOutcome, SpeechHandle, SpeechSynthesizer,
};

#[cfg(feature = "espeak")]
pub use speech::EspeakSynthesizer;
