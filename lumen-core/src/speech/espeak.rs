//! `EspeakSynthesizer` — drives the `espeak-ng` command-line synthesizer
//! installed on most Linux systems.
//!
//! Utterances run as child processes on a dedicated speaker thread so `speak`
//! never blocks the caller. Flush semantics kill the active child and drop
//! queued jobs by generation number. Voice availability is probed once from
//! `espeak-ng --voices` during `initialize`.

use std::collections::HashSet;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{LumenError, Result};
use crate::speech::{QueueMode, SetLanguageOutcome, SpeechSynthesizer};

/// Poll interval while waiting for an utterance child to exit.
const CHILD_POLL: Duration = Duration::from_millis(20);

struct Job {
    text: String,
    voice: String,
    utterance_id: String,
    generation: u64,
}

/// Command-line espeak-ng backend.
pub struct EspeakSynthesizer {
    binary: String,
    ready: bool,
    language: String,
    voices: HashSet<String>,
    jobs: Option<Sender<Job>>,
    flush_generation: Arc<AtomicU64>,
    active: Arc<Mutex<Option<Child>>>,
    speaker: Option<thread::JoinHandle<()>>,
}

impl EspeakSynthesizer {
    pub fn new() -> Self {
        Self::with_binary("espeak-ng")
    }

    /// Use a specific espeak binary (e.g. plain `espeak`, or a test shim).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ready: false,
            language: "en".to_string(),
            voices: HashSet::new(),
            jobs: None,
            flush_generation: Arc::new(AtomicU64::new(0)),
            active: Arc::new(Mutex::new(None)),
            speaker: None,
        }
    }

    fn interrupt_active(&self) {
        if let Some(child) = self.active.lock().as_mut() {
            let _ = child.kill();
        }
    }
}

impl Default for EspeakSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSynthesizer for EspeakSynthesizer {
    fn initialize(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }

        let output = Command::new(&self.binary)
            .arg("--voices")
            .output()
            .map_err(|e| LumenError::SpeechEngine(format!("failed to run {}: {e}", self.binary)))?;
        if !output.status.success() {
            return Err(LumenError::SpeechEngine(format!(
                "{} --voices exited with {}",
                self.binary, output.status
            )));
        }
        self.voices = parse_voice_codes(&String::from_utf8_lossy(&output.stdout));
        if self.voices.is_empty() {
            return Err(LumenError::SpeechEngine(format!(
                "{} reported no voices",
                self.binary
            )));
        }

        let (tx, rx) = unbounded();
        let binary = self.binary.clone();
        let flush = self.flush_generation.clone();
        let active = self.active.clone();
        self.speaker = Some(
            thread::Builder::new()
                .name("lumen-espeak".to_string())
                .spawn(move || run_speaker(binary, rx, flush, active))
                .map_err(|e| LumenError::SpeechEngine(format!("speaker thread: {e}")))?,
        );
        self.jobs = Some(tx);
        self.ready = true;
        debug!(voices = self.voices.len(), "espeak-ng ready");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn speak(&mut self, text: &str, mode: QueueMode, utterance_id: &str) -> Result<()> {
        if !self.ready {
            return Err(LumenError::SpeechNotReady);
        }
        let Some(jobs) = self.jobs.as_ref() else {
            return Err(LumenError::SpeechNotReady);
        };

        if mode == QueueMode::Flush {
            self.flush_generation.fetch_add(1, Ordering::AcqRel);
            self.interrupt_active();
        }

        jobs.send(Job {
            text: text.to_string(),
            voice: self.language.clone(),
            utterance_id: utterance_id.to_string(),
            generation: self.flush_generation.load(Ordering::Acquire),
        })
        .map_err(|_| LumenError::SpeechEngine("speaker thread is gone".to_string()))
    }

    fn stop(&mut self) {
        self.flush_generation.fetch_add(1, Ordering::AcqRel);
        self.interrupt_active();
    }

    fn set_language(&mut self, code: &str) -> SetLanguageOutcome {
        // espeak-ng compiles voice data in, so a recognised voice is never
        // missing — the outcome is binary here.
        let code = code.to_lowercase();
        if self.voices.contains(&code) {
            self.language = code;
            SetLanguageOutcome::Applied
        } else {
            SetLanguageOutcome::Unsupported
        }
    }

    fn is_language_available(&self, code: &str) -> bool {
        self.voices.contains(&code.to_lowercase())
    }

    fn current_language(&self) -> String {
        self.language.clone()
    }
}

impl Drop for EspeakSynthesizer {
    fn drop(&mut self) {
        // Closing the channel lets the speaker drain and exit; the thread is
        // detached so a long utterance never blocks the dropping context.
        self.jobs.take();
        self.interrupt_active();
        self.speaker.take();
    }
}

fn run_speaker(
    binary: String,
    rx: Receiver<Job>,
    flush: Arc<AtomicU64>,
    active: Arc<Mutex<Option<Child>>>,
) {
    for job in rx.iter() {
        if job.generation < flush.load(Ordering::Acquire) {
            debug!(utterance = %job.utterance_id, "dropping flushed utterance");
            continue;
        }

        let spawned = Command::new(&binary)
            .arg("-v")
            .arg(&job.voice)
            .arg(&job.text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "failed to spawn {binary}");
                continue;
            }
        };
        *active.lock() = Some(child);

        // Poll rather than wait so `speak(Flush)` can kill the child from
        // another thread between polls.
        loop {
            let finished = {
                let mut guard = active.lock();
                match guard.as_mut() {
                    None => true,
                    Some(child) => matches!(child.try_wait(), Ok(Some(_)) | Err(_)),
                }
            };
            if finished {
                break;
            }
            thread::sleep(CHILD_POLL);
        }
        *active.lock() = None;
    }
    debug!("espeak speaker thread exiting");
}

/// Extract the language-code column from `espeak-ng --voices` output.
///
/// Hyphenated codes also register their primary subtag, so `en-gb` makes
/// plain `en` available.
fn parse_voice_codes(listing: &str) -> HashSet<String> {
    let mut codes = HashSet::new();
    for line in listing.lines().skip(1) {
        let Some(code) = line.split_whitespace().nth(1) else {
            continue;
        };
        let code = code.to_lowercase();
        if let Some((primary, _)) = code.split_once('-') {
            codes.insert(primary.to_string());
        }
        codes.insert(code);
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_listing_parses_codes_and_primary_subtags() {
        let listing = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 5  en-gb           --/M      English_(Great_Britain) gmw/en
 5  hi              --/M      Hindi              inc/hi
 5  te              --/M      Telugu             dra/te
";
        let codes = parse_voice_codes(listing);
        assert!(codes.contains("af"));
        assert!(codes.contains("en-gb"));
        assert!(codes.contains("en"));
        assert!(codes.contains("hi"));
        assert!(codes.contains("te"));
        assert!(!codes.contains("pty"));
    }
}
