use std::path::PathBuf;

use thiserror::Error;

/// Broad class of a [`NarrateError`], for callers that branch on the kind of
/// failure rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing input; retrying with fixed input can succeed.
    Input,
    /// The voice model produced something unusable.
    Synthesis,
    /// The external codec failed.
    Encode,
    /// The run was interrupted before an artifact was produced.
    Cancelled,
    /// Filesystem or process plumbing failed.
    Io,
}

#[derive(Error, Debug)]
pub enum NarrateError {
    #[error("Voice model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Failed to load voice model {}: {reason}", .path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Codec tool not found: {0}. Install ffmpeg or set its path in the config.")]
    CodecNotFound(String),

    #[error("No text to synthesize after chunking")]
    EmptyText,

    #[error("Text too short: {len} character(s), at least {min} required")]
    TextTooShort { len: usize, min: usize },

    #[error("Invalid chunk limits: min {min} must not exceed max {max}, and max must be positive")]
    InvalidLimits { min: usize, max: usize },

    #[error("Audio inputs disagree on format: {0}")]
    FormatMismatch(String),

    #[error("No audio inputs provided")]
    NoAudio,

    #[error("Unsupported audio format from voice model for segment {index}: {detail}")]
    UnsupportedAudioFormat { index: usize, detail: String },

    #[error("Synthesis failed for segment {index}: {stderr}")]
    SynthesisFailed { index: usize, stderr: String },

    #[error("Encoder exited with {}: {stderr}", status.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()))]
    EncodeFailed { status: Option<i32>, stderr: String },

    #[error("ffprobe failed: {0}")]
    Probe(String),

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NarrateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NarrateError::ModelNotFound(_)
            | NarrateError::ModelLoad { .. }
            | NarrateError::CodecNotFound(_)
            | NarrateError::EmptyText
            | NarrateError::TextTooShort { .. }
            | NarrateError::InvalidLimits { .. }
            | NarrateError::FormatMismatch(_)
            | NarrateError::NoAudio
            | NarrateError::Config(_)
            | NarrateError::TomlParse(_) => ErrorKind::Input,
            NarrateError::UnsupportedAudioFormat { .. } | NarrateError::SynthesisFailed { .. } => {
                ErrorKind::Synthesis
            }
            NarrateError::EncodeFailed { .. } | NarrateError::Probe(_) => ErrorKind::Encode,
            NarrateError::Cancelled => ErrorKind::Cancelled,
            NarrateError::Io(_)
            | NarrateError::Wav(_)
            | NarrateError::Json(_)
            | NarrateError::TomlSerialize(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, NarrateError>;
