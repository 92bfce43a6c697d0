use thiserror::Error;

/// All errors produced by lumen-core.
#[derive(Debug, Error)]
pub enum LumenError {
    #[error("classifier error: {0}")]
    ClassifierFailure(String),

    #[error("speech engine error: {0}")]
    SpeechEngine(String),

    #[error("speech engine is not initialized")]
    SpeechNotReady,

    #[error("language '{code}' is not available on this speech engine")]
    LanguageUnavailable { code: String },

    #[error("no language in the cycle could be applied ({attempts} attempted)")]
    LanguageCycleExhausted { attempts: usize },

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LumenError>;
