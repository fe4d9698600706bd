//! Reading tags, chapters and duration back from a container with ffprobe.

use super::ffmpeg::FfmpegTools;
use crate::error::{NarrateError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// What ffprobe reports about an audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub duration_secs: Option<f64>,
    /// Format-level tags, keys lowercased
    pub tags: BTreeMap<String, String>,
    pub chapters: Vec<ProbedChapter>,
}

impl ProbeReport {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether the iTunes media kind marks this file as an audiobook.
    pub fn is_audiobook(&self) -> bool {
        self.tag(super::metadata::MEDIA_TYPE_KEY) == Some(super::metadata::MEDIA_TYPE_AUDIOBOOK)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbedChapter {
    pub title: Option<String>,
    pub start_secs: f64,
    pub end_secs: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    chapters: Vec<FfprobeChapter>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeChapter {
    start_time: String,
    end_time: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Probe an audio file.
pub async fn probe(tools: &FfmpegTools, path: &Path) -> Result<ProbeReport> {
    let output = tools
        .ffprobe_command()
        .args([
            "-v",
            "error",
            "-show_format",
            "-show_chapters",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => NarrateError::CodecNotFound("ffprobe".to_string()),
            _ => NarrateError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NarrateError::Probe(stderr.trim().to_string()));
    }

    parse_report(&String::from_utf8_lossy(&output.stdout))
}

fn parse_report(json: &str) -> Result<ProbeReport> {
    let parsed: FfprobeOutput = serde_json::from_str(json)?;

    let (duration_secs, tags) = match parsed.format {
        Some(format) => (
            format.duration.and_then(|d| d.trim().parse().ok()),
            lowercase_keys(format.tags),
        ),
        None => (None, BTreeMap::new()),
    };

    let chapters = parsed
        .chapters
        .into_iter()
        .map(|c| ProbedChapter {
            title: lowercase_keys(c.tags).remove("title"),
            start_secs: c.start_time.trim().parse().unwrap_or(0.0),
            end_secs: c.end_time.trim().parse().unwrap_or(0.0),
        })
        .collect();

    Ok(ProbeReport {
        duration_secs,
        tags,
        chapters,
    })
}

fn lowercase_keys(tags: BTreeMap<String, String>) -> BTreeMap<String, String> {
    tags.into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect()
}
