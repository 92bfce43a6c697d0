//! `StubSynthesizer` — placeholder backend that logs utterances instead of
//! producing audio.
//!
//! Used during development, by the soak binary, and anywhere speech output is
//! unavailable. Tracks the active language so the full switching flow can be
//! exercised end-to-end.

use tracing::{debug, info};

use crate::error::{LumenError, Result};
use crate::locale;
use crate::speech::{QueueMode, SetLanguageOutcome, SpeechSynthesizer};

/// Logging stub synthesizer.
pub struct StubSynthesizer {
    ready: bool,
    language: String,
    available: Vec<String>,
    utterances: u64,
}

impl StubSynthesizer {
    pub fn new() -> Self {
        let mut available = locale::default_cycle();
        available.extend(["fr", "de", "es"].map(String::from));
        Self::with_languages(available)
    }

    /// Build a stub that reports exactly `codes` as available.
    pub fn with_languages<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ready: false,
            language: "en".to_string(),
            available: codes.into_iter().map(|c| c.into().to_lowercase()).collect(),
            utterances: 0,
        }
    }
}

impl Default for StubSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for StubSynthesizer {
    fn initialize(&mut self) -> Result<()> {
        self.ready = true;
        debug!(languages = self.available.len(), "StubSynthesizer ready");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()> {
        if !self.ready {
            return Err(LumenError::SpeechNotReady);
        }
        self.utterances += 1;
        info!(
            utterance = utterance_id,
            n = self.utterances,
            language = %self.language,
            ?mode,
            "stub speak: {text}"
        );
        Ok(())
    }

    fn stop(&mut self) {
        debug!("StubSynthesizer::stop");
    }

    fn set_language(&mut self, code: &str) -> SetLanguageOutcome {
        // A stub has no voice data to be missing, so the outcome is binary.
        let code = code.to_lowercase();
        if self.available.iter().any(|c| c == &code) {
            self.language = code;
            SetLanguageOutcome::Applied
        } else {
            SetLanguageOutcome::Unsupported
        }
    }

    fn is_language_available(&self, code: &str) -> bool {
        let code = code.to_lowercase();
        self.available.iter().any(|c| c == &code)
    }

    fn current_language(&self) -> String {
        self.language.clone()
    }
}
