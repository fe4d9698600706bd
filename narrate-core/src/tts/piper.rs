//! Piper TTS backend driving the `piper` executable.
//!
//! Piper reads text on stdin and, with `--output_raw`, streams mono 16-bit
//! little-endian PCM on stdout at the sample rate declared in the model's
//! `.onnx.json` config.

use super::{AudioFragment, VoiceModel};
use crate::error::{NarrateError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Sample rate used when the model config does not declare one.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Bytes read from piper's stdout per fragment.
const READ_SIZE: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct PiperModelConfig {
    #[serde(default)]
    audio: PiperAudioConfig,
}

#[derive(Debug, Deserialize)]
struct PiperAudioConfig {
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,
}

impl Default for PiperAudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

/// A Piper voice, loaded once and reused for every segment.
#[derive(Debug, Clone)]
pub struct PiperVoice {
    model_path: PathBuf,
    binary: PathBuf,
    sample_rate: u32,
    name: String,
}

impl PiperVoice {
    /// Load a voice model.
    ///
    /// # Arguments
    /// * `model_path` - Path to the `.onnx` model; its `.onnx.json` config must sit beside it
    /// * `binary` - Explicit piper executable, or None to search PATH
    pub fn load(model_path: &Path, binary: Option<&Path>) -> Result<Self> {
        if !model_path.exists() {
            return Err(NarrateError::ModelNotFound(model_path.to_path_buf()));
        }

        let config_path = config_path_for(model_path);
        let content =
            std::fs::read_to_string(&config_path).map_err(|e| NarrateError::ModelLoad {
                path: model_path.to_path_buf(),
                reason: format!("cannot read {}: {}", config_path.display(), e),
            })?;
        let config: PiperModelConfig =
            serde_json::from_str(&content).map_err(|e| NarrateError::ModelLoad {
                path: model_path.to_path_buf(),
                reason: format!("invalid model config: {}", e),
            })?;

        let binary = find_piper(binary).map_err(|reason| NarrateError::ModelLoad {
            path: model_path.to_path_buf(),
            reason,
        })?;

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "piper".to_string());

        log::info!(
            "Loaded voice model {} ({} Hz) using {}",
            name,
            config.audio.sample_rate,
            binary.display()
        );

        Ok(Self {
            model_path: model_path.to_path_buf(),
            binary,
            sample_rate: config.audio.sample_rate,
            name,
        })
    }
}

#[async_trait]
impl VoiceModel for PiperVoice {
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioFragment>> {
        let mut child = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--output_raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("piper stdin unavailable"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("piper stdout unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("piper stderr unavailable"))?;

        // Piper treats each input line as an utterance.
        let line = format!("{}\n", text.replace('\n', " "));
        let write = async move {
            stdin.write_all(line.as_bytes()).await?;
            stdin.shutdown().await
        };

        let read = async move {
            let mut fragments = Vec::new();
            let mut pending: Vec<u8> = Vec::new();
            let mut buf = vec![0u8; READ_SIZE];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                pending.extend_from_slice(&buf[..n]);
                let even = pending.len() - pending.len() % 2;
                let rest = pending.split_off(even);
                fragments.push(AudioFragment::Int16Bytes(std::mem::replace(
                    &mut pending,
                    rest,
                )));
            }
            if !pending.is_empty() {
                fragments.push(AudioFragment::Int16Bytes(pending));
            }
            Ok::<_, std::io::Error>(fragments)
        };

        let errors = async move {
            let mut out = String::new();
            stderr.read_to_string(&mut out).await?;
            Ok::<_, std::io::Error>(out)
        };

        let (written, fragments, stderr_text) = tokio::join!(write, read, errors);
        let status = child.wait().await?;
        let stderr_text = stderr_text.unwrap_or_default();

        if !status.success() {
            return Err(NarrateError::SynthesisFailed {
                index: 0,
                stderr: stderr_text.trim().to_string(),
            });
        }
        written?;

        Ok(fragments?
            .into_iter()
            .filter(|f| !matches!(f, AudioFragment::Int16Bytes(b) if b.is_empty()))
            .collect())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `voice.onnx` -> `voice.onnx.json`
fn config_path_for(model_path: &Path) -> PathBuf {
    let mut path: OsString = model_path.as_os_str().to_owned();
    path.push(".json");
    PathBuf::from(path)
}

fn find_piper(explicit: Option<&Path>) -> std::result::Result<PathBuf, String> {
    match explicit {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => Err(format!("piper executable not found at {}", path.display())),
        None => which::which("piper").map_err(|e| format!("piper not found in PATH: {}", e)),
    }
}
