//! Speech synthesis abstraction.
//!
//! The `SpeechSynthesizer` trait decouples the pipeline and the language
//! switcher from any specific backend (logging stub, espeak-ng, a platform
//! TTS bridge, etc.).
//!
//! `&mut self` on the speaking and language methods expresses that
//! synthesizers are stateful — active voice, utterance queue. All mutation is
//! therefore serialised through `SpeechHandle`'s `parking_lot::Mutex`.

pub mod stub;

#[cfg(feature = "espeak")]
pub mod espeak;

#[cfg(feature = "espeak")]
pub use espeak::EspeakSynthesizer;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// How a new utterance interacts with whatever is already speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Interrupt the current utterance and drop anything queued.
    Flush,
    /// Append after whatever is queued.
    Queue,
}

/// Result of applying an output language to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetLanguageOutcome {
    /// The language is now active.
    Applied,
    /// The backend recognises the language but its voice data is not
    /// installed.
    MissingData,
    /// The backend does not support the language.
    Unsupported,
}

/// Contract for speech synthesis backends.
pub trait SpeechSynthesizer: Send + 'static {
    /// One-time initialization: bind the platform engine, probe available
    /// voices, apply the default language. The engine refuses to build a
    /// pipeline over a synthesizer that has not initialized successfully.
    ///
    /// # Errors
    /// Returns an error if the underlying engine cannot be reached.
    fn initialize(&mut self) -> Result<()>;

    /// True once `initialize` has reported success.
    fn is_ready(&self) -> bool;

    /// Speak an utterance in the active language.
    ///
    /// `utterance_id` identifies the request to the backend (progress
    /// callbacks, log correlation). Dispatch is asynchronous: returning `Ok`
    /// means the utterance was accepted, not that it finished playing.
    ///
    /// # Errors
    /// Returns an error if called before `initialize` or if the backend
    /// rejects the utterance.
    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()>;

    /// Stop the current utterance and drop anything queued.
    fn stop(&mut self);

    /// Make `code` (ISO 639-1) the active output language.
    fn set_language(&mut self, code: &str) -> SetLanguageOutcome;

    /// True if the backend could speak `code` right now.
    fn is_language_available(&self, code: &str) -> bool;

    /// ISO 639-1 code of the active output language.
    fn current_language(&self) -> String;
}

/// Thread-safe reference-counted handle to any `SpeechSynthesizer` implementor.
///
/// Uses `parking_lot::Mutex` for:
/// - Non-poisoning on panic (unlike `std::sync::Mutex`)
/// - Cheap uncontended locking on the per-announcement path
#[derive(Clone)]
pub struct SpeechHandle(pub Arc<Mutex<dyn SpeechSynthesizer>>);

impl SpeechHandle {
    /// Wrap any `SpeechSynthesizer` in a `SpeechHandle`.
    pub fn new<S: SpeechSynthesizer>(synthesizer: S) -> Self {
        Self(Arc::new(Mutex::new(synthesizer)))
    }
}

impl std::fmt::Debug for SpeechHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechHandle").finish_non_exhaustive()
    }
}
