//! Cyclic output-language switching over the speech engine.

use tracing::{info, warn};

use crate::error::{LumenError, Result};
use crate::locale;
use crate::speech::{QueueMode, SetLanguageOutcome, SpeechHandle, SpeechSynthesizer};

/// A successfully applied language switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSwitch {
    /// Code now active on the speech engine.
    pub code: String,
    /// Human-readable language name.
    pub name: String,
}

/// Rotates the speech engine's output language through a fixed sequence.
///
/// Two entry modes:
/// - an explicit code is applied as-is and fails without fallback;
/// - a cycle request advances from the current language and keeps trying
///   successive candidates until one applies, visiting each entry at most
///   once before reporting exhaustion.
pub struct LanguageCycler {
    speech: SpeechHandle,
    sequence: Vec<String>,
}

impl LanguageCycler {
    pub fn new(speech: SpeechHandle, sequence: Vec<String>) -> Self {
        let sequence = sequence.into_iter().map(|c| c.to_lowercase()).collect();
        Self { speech, sequence }
    }

    /// Switch to exactly `code`.
    ///
    /// # Errors
    /// `LanguageUnavailable` if the speech engine cannot apply the language.
    /// Explicit requests never fall back to another language.
    pub fn switch_to(&self, code: &str) -> Result<LanguageSwitch> {
        let code = code.to_lowercase();
        let mut speech = self.speech.0.lock();
        if !speech.is_language_available(&code) {
            return Err(LumenError::LanguageUnavailable { code });
        }
        match speech.set_language(&code) {
            SetLanguageOutcome::Applied => confirm(&mut *speech, &code),
            outcome => {
                warn!(language = %code, ?outcome, "explicit language request refused");
                Err(LumenError::LanguageUnavailable { code })
            }
        }
    }

    /// Advance to the next language in the sequence.
    ///
    /// Starts after the current language (or at the head when the current
    /// language is not part of the sequence) and tries each candidate in
    /// rotation order. Candidates the engine refuses are skipped.
    ///
    /// # Errors
    /// `LanguageCycleExhausted` once every candidate has been tried.
    pub fn cycle(&self) -> Result<LanguageSwitch> {
        if self.sequence.is_empty() {
            return Err(LumenError::LanguageCycleExhausted { attempts: 0 });
        }

        let mut speech = self.speech.0.lock();
        let current = speech.current_language().to_lowercase();
        let start = match self.sequence.iter().position(|c| *c == current) {
            Some(i) if i + 1 < self.sequence.len() => i + 1,
            _ => 0,
        };

        for step in 0..self.sequence.len() {
            let candidate = &self.sequence[(start + step) % self.sequence.len()];
            match speech.set_language(candidate) {
                SetLanguageOutcome::Applied => return confirm(&mut *speech, candidate),
                outcome => {
                    warn!(language = %candidate, ?outcome, "cycle candidate refused — trying next");
                }
            }
        }

        Err(LumenError::LanguageCycleExhausted {
            attempts: self.sequence.len(),
        })
    }

    /// The rotation this cycler walks.
    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }
}

/// Announce an applied switch in the new language.
fn confirm(speech: &mut dyn SpeechSynthesizer, code: &str) -> Result<LanguageSwitch> {
    let name = locale::display_name(code);
    // Anything still queued belongs to the old language; drop it before the
    // confirmation so no stale-language utterance survives the switch.
    speech.stop();
    if let Err(e) = speech.speak(&format!("Switched to {name}"), QueueMode::Flush, "lang-switch") {
        warn!(error = %e, "language confirmation could not be spoken");
    }
    info!(language = code, name = %name, "output language switched");
    Ok(LanguageSwitch {
        code: code.to_string(),
        name,
    })
}
