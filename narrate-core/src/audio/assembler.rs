//! Audio file assembly using FFmpeg.

use super::chapters::{self, ChapterMark, ChapterSpan};
use super::ffmpeg::FfmpegTools;
use super::metadata::MetadataRecord;
use super::pcm::{PcmBuffer, check_pcm16_mono, samples_to_secs};
use crate::error::{NarrateError, Result};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// Encoder options for the final container.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub codec: String,
    pub bitrate: String,
    pub channels: u16,
    /// Run the stream-copy tagging pass after encoding
    pub tag_pass: bool,
    /// Cover image attached during the tagging pass
    pub cover_image: Option<PathBuf>,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: "aac".to_string(),
            bitrate: "64k".to_string(),
            channels: 1,
            tag_pass: true,
            cover_image: None,
        }
    }
}

/// A non-fatal problem: the artifact is valid but lacks something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// Chapters could not be generated; the file has none.
    ChaptersDropped { reason: String },
    /// The tagging pass failed; tags from the encode pass remain.
    TaggingSkipped { reason: String },
}

/// The finished audiobook file.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub chapters: Vec<ChapterSpan>,
    pub degradations: Vec<Degradation>,
}

impl AudioArtifact {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Format and length of a concatenated WAV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSummary {
    pub sample_rate: u32,
    pub samples: u64,
}

impl WavSummary {
    pub fn duration_secs(&self) -> f64 {
        samples_to_secs(self.samples, self.sample_rate)
    }
}

/// Concatenate WAV files in order into one.
///
/// Inputs must all be mono 16-bit PCM at the same sample rate. Nothing is
/// inserted between inputs. A single input is copied as-is.
pub fn concatenate_wavs<P: AsRef<Path>>(inputs: &[P], output_path: &Path) -> Result<WavSummary> {
    let first = inputs.first().ok_or(NarrateError::NoAudio)?.as_ref();

    let first_reader = hound::WavReader::open(first)?;
    let spec = first_reader.spec();
    check_pcm16_mono(&spec, first)?;

    if inputs.len() == 1 {
        let samples = first_reader.duration() as u64;
        drop(first_reader);
        std::fs::copy(first, output_path)?;
        return Ok(WavSummary {
            sample_rate: spec.sample_rate,
            samples,
        });
    }
    drop(first_reader);

    let mut writer = hound::WavWriter::create(output_path, spec)?;
    let mut total = 0u64;

    for input in inputs {
        let input = input.as_ref();
        let mut reader = hound::WavReader::open(input)?;
        if reader.spec() != spec {
            return Err(NarrateError::FormatMismatch(format!(
                "{} is {} Hz, expected {} Hz like {}",
                input.display(),
                reader.spec().sample_rate,
                spec.sample_rate,
                first.display()
            )));
        }
        for sample in reader.samples::<i16>() {
            writer.write_sample(sample?)?;
            total += 1;
        }
    }

    writer.finalize()?;
    Ok(WavSummary {
        sample_rate: spec.sample_rate,
        samples: total,
    })
}

/// Concatenates audio chunks and encodes them into a tagged, chaptered M4B.
#[derive(Debug, Clone)]
pub struct AudioAssembler {
    tools: FfmpegTools,
    settings: EncodeSettings,
}

impl AudioAssembler {
    pub fn new(tools: FfmpegTools, settings: EncodeSettings) -> Self {
        Self { tools, settings }
    }

    pub fn tools(&self) -> &FfmpegTools {
        &self.tools
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Assemble in-memory buffers, ordered by their position in the slice.
    pub async fn assemble_pcm(
        &self,
        buffers: &[PcmBuffer],
        metadata: &MetadataRecord,
        chapters: Option<&[ChapterMark]>,
        output_path: &Path,
    ) -> Result<AudioArtifact> {
        let temp_dir = TempDir::new()?;
        let mut inputs = Vec::with_capacity(buffers.len());
        for (i, buffer) in buffers.iter().enumerate() {
            let path = temp_dir.path().join(format!("buffer_{:05}.wav", i));
            buffer.write_wav(&path)?;
            inputs.push(path);
        }

        self.assemble(&inputs, metadata, chapters, output_path).await
    }

    /// Assemble WAV chunks into a single M4B audiobook.
    ///
    /// # Arguments
    /// * `inputs` - WAV chunk files in playback order
    /// * `metadata` - Tags for the output
    /// * `chapters` - Optional chapter marks; ends are filled per the timing policy
    /// * `output_path` - Destination. Only written once encoding succeeded.
    pub async fn assemble(
        &self,
        inputs: &[PathBuf],
        metadata: &MetadataRecord,
        chapters: Option<&[ChapterMark]>,
        output_path: &Path,
    ) -> Result<AudioArtifact> {
        if inputs.is_empty() {
            return Err(NarrateError::NoAudio);
        }

        let temp_dir = TempDir::new()?;
        let mut degradations = Vec::new();

        log::info!("Concatenating {} audio chunk(s)", inputs.len());
        let all_audio_wav = temp_dir.path().join("all_audio.wav");
        let summary = {
            let inputs = inputs.to_vec();
            let output = all_audio_wav.clone();
            tokio::task::spawn_blocking(move || concatenate_wavs(&inputs, &output))
                .await
                .map_err(|e| std::io::Error::other(format!("concatenation task failed: {}", e)))??
        };
        let duration_secs = summary.duration_secs();

        let chapter_spans = match chapters {
            Some(marks) if !marks.is_empty() => {
                let metadata_file = temp_dir.path().join("chapters.txt");
                match prepare_chapters(marks, duration_secs, &metadata_file) {
                    Ok(spans) => Some((spans, metadata_file)),
                    Err(reason) => {
                        log::warn!("Encoding without chapters: {}", reason);
                        degradations.push(Degradation::ChaptersDropped { reason });
                        None
                    }
                }
            }
            _ => None,
        };

        let output_dir = parent_dir(output_path);
        std::fs::create_dir_all(&output_dir)?;

        let encoded = partial_file(&output_dir)?;
        log::info!(
            "Encoding {:.1}s of audio ({} {}, {} Hz)",
            duration_secs,
            self.settings.codec,
            self.settings.bitrate,
            summary.sample_rate
        );
        self.encode(
            &all_audio_wav,
            chapter_spans.as_ref().map(|(_, file)| file.as_path()),
            metadata,
            summary.sample_rate,
            encoded.path(),
        )
        .await?;

        let finished = if self.settings.tag_pass {
            let tagged = self.tag(encoded.path(), metadata, &output_dir).await;
            match tagged {
                Ok(tagged) => tagged,
                Err(e) => {
                    let reason = e.to_string();
                    log::warn!("Tagging pass failed, keeping encoded file: {}", reason);
                    degradations.push(Degradation::TaggingSkipped { reason });
                    encoded
                }
            }
        } else {
            encoded
        };

        finished
            .as_file()
            .set_permissions(output_permissions(finished.path(), output_path)?)?;
        finished
            .persist(output_path)
            .map_err(|e| NarrateError::Io(e.error))?;

        log::info!("Wrote {}", output_path.display());

        Ok(AudioArtifact {
            path: output_path.to_path_buf(),
            duration_secs,
            chapters: chapter_spans.map(|(spans, _)| spans).unwrap_or_default(),
            degradations,
        })
    }

    /// Primary pass: PCM to compressed audio with tags and chapters.
    async fn encode(
        &self,
        input_wav: &Path,
        chapter_file: Option<&Path>,
        metadata: &MetadataRecord,
        sample_rate: u32,
        output: &Path,
    ) -> Result<()> {
        let mut cmd = self.tools.ffmpeg_command();
        cmd.args(["-hide_banner", "-nostdin", "-y", "-i"]).arg(input_wav);

        if let Some(file) = chapter_file {
            cmd.arg("-i")
                .arg(file)
                .args(["-map_metadata", "1", "-map_chapters", "1"]);
        }

        cmd.args(["-map", "0:a"])
            .args(["-c:a", self.settings.codec.as_str()])
            .args(["-b:a", self.settings.bitrate.as_str()])
            .args(["-ar", sample_rate.to_string().as_str()])
            .args(["-ac", self.settings.channels.to_string().as_str()])
            .args(metadata.ffmpeg_args())
            .args(["-f", "mp4"])
            .arg(output);

        run_ffmpeg(cmd).await
    }

    /// Secondary pass: stream-copy remux re-applying tags and the cover.
    async fn tag(
        &self,
        encoded: &Path,
        metadata: &MetadataRecord,
        output_dir: &Path,
    ) -> Result<NamedTempFile> {
        let tagged = partial_file(output_dir)?;

        let mut cmd = self.tools.ffmpeg_command();
        cmd.args(["-hide_banner", "-nostdin", "-y", "-i"]).arg(encoded);

        match self.settings.cover_image {
            Some(ref cover) if cover.exists() => {
                cmd.arg("-i").arg(cover).args([
                    "-map",
                    "0:a",
                    "-map",
                    "1:v",
                    "-c",
                    "copy",
                    "-disposition:v:0",
                    "attached_pic",
                ]);
            }
            Some(ref cover) => {
                log::warn!("Cover image not found: {}", cover.display());
                cmd.args(["-map", "0:a", "-c", "copy"]);
            }
            None => {
                cmd.args(["-map", "0:a", "-c", "copy"]);
            }
        }

        cmd.args(["-map_chapters", "0", "-map_metadata", "0"])
            .args(metadata.ffmpeg_args())
            .args(["-f", "mp4"])
            .arg(tagged.path());

        run_ffmpeg(cmd).await?;
        Ok(tagged)
    }
}

fn prepare_chapters(
    marks: &[ChapterMark],
    duration_secs: f64,
    metadata_file: &Path,
) -> std::result::Result<Vec<ChapterSpan>, String> {
    let spans = chapters::resolve(marks, Some(duration_secs))?;
    chapters::write_chapter_file(&spans, metadata_file)
        .map_err(|e| format!("failed to write chapter file: {}", e))?;
    Ok(spans)
}

/// Temp file beside the destination so the final rename stays on one
/// filesystem. Removed on drop unless persisted.
fn partial_file(dir: &Path) -> Result<NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix(".narrate-")
        .suffix(".m4b.part")
        .tempfile_in(dir)?)
}

/// Mode for the finished file: whatever the destination already has, else
/// 0644. Temp files are created owner-only.
fn output_permissions(finished: &Path, destination: &Path) -> Result<std::fs::Permissions> {
    match std::fs::metadata(destination) {
        Ok(existing) if existing.is_file() => Ok(existing.permissions()),
        _ => new_file_permissions(finished),
    }
}

#[cfg(unix)]
fn new_file_permissions(_finished: &Path) -> Result<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Ok(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions(finished: &Path) -> Result<std::fs::Permissions> {
    Ok(std::fs::metadata(finished)?.permissions())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn run_ffmpeg(mut cmd: tokio::process::Command) -> Result<()> {
    let output = cmd.output().await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => NarrateError::CodecNotFound("ffmpeg".to_string()),
        _ => NarrateError::Io(e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        log::error!("ffmpeg error: {}", stderr);
        return Err(NarrateError::EncodeFailed {
            status: output.status.code(),
            stderr,
        });
    }

    Ok(())
}
