//! narrate configuration management.

use crate::audio::assembler::EncodeSettings;
use crate::audio::metadata::{DEFAULT_ALBUM, DEFAULT_GENRE, MetadataRecord};
use crate::audio::speed::{DEFAULT_SPEED, Speed};
use crate::error::Result;
use crate::pipeline::{DEFAULT_CHAPTER_TEMPLATE, PipelineOptions};
use crate::text::chunker::{ChunkerLimits, MAX_CHUNK_LENGTH, MIN_CHUNK_LENGTH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const DEFAULT_CODEC: &str = "aac";
const DEFAULT_BITRATE: &str = "64k";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrateConfig {
    /// Piper voice model (.onnx). The matching .onnx.json must sit beside it.
    #[serde(default)]
    pub voice_model: Option<PathBuf>,

    /// Explicit piper executable. None means search PATH.
    #[serde(default)]
    pub piper_path: Option<PathBuf>,

    /// Explicit ffmpeg executable. None means search PATH.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ffprobe executable. None means search PATH.
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Speech speed multiplier (0.5-2.0)
    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default = "default_max_chunk_length")]
    pub max_chunk_length: usize,

    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,

    /// Audio codec passed to ffmpeg
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Audio bitrate passed to ffmpeg
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Number of segments synthesized at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Title for untitled chapters; `{n}` is replaced by the 1-based number
    #[serde(default = "default_chapter_title_template")]
    pub chapter_title_template: String,

    #[serde(default = "default_album")]
    pub album: String,

    #[serde(default = "default_genre")]
    pub genre: String,
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

fn default_max_chunk_length() -> usize {
    MAX_CHUNK_LENGTH
}

fn default_min_chunk_length() -> usize {
    MIN_CHUNK_LENGTH
}

fn default_codec() -> String {
    DEFAULT_CODEC.to_string()
}

fn default_bitrate() -> String {
    DEFAULT_BITRATE.to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_chapter_title_template() -> String {
    DEFAULT_CHAPTER_TEMPLATE.to_string()
}

fn default_album() -> String {
    DEFAULT_ALBUM.to_string()
}

fn default_genre() -> String {
    DEFAULT_GENRE.to_string()
}

impl Default for NarrateConfig {
    fn default() -> Self {
        Self {
            voice_model: None,
            piper_path: None,
            ffmpeg_path: None,
            ffprobe_path: None,
            speed: default_speed(),
            max_chunk_length: default_max_chunk_length(),
            min_chunk_length: default_min_chunk_length(),
            codec: default_codec(),
            bitrate: default_bitrate(),
            concurrency: default_concurrency(),
            chapter_title_template: default_chapter_title_template(),
            album: default_album(),
            genre: default_genre(),
        }
    }
}

impl NarrateConfig {
    /// Get the config file path: ~/.config/cli-programs/narrate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            crate::NarrateError::Config("Could not determine home directory".to_string())
        })?;
        Ok(home
            .join(".config")
            .join("cli-programs")
            .join("narrate.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: NarrateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn chunker_limits(&self) -> Result<ChunkerLimits> {
        ChunkerLimits::new(self.min_chunk_length, self.max_chunk_length)
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            codec: self.codec.clone(),
            bitrate: self.bitrate.clone(),
            ..EncodeSettings::default()
        }
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        Ok(PipelineOptions {
            limits: self.chunker_limits()?,
            speed: Speed::new(self.speed),
            concurrency: self.concurrency.max(1),
            chapter_title_template: self.chapter_title_template.clone(),
            ..PipelineOptions::default()
        })
    }

    /// Tags every conversion starts from.
    pub fn base_metadata(&self) -> MetadataRecord {
        MetadataRecord::new()
            .with_album(self.album.clone())
            .with_genre(self.genre.clone())
    }
}
