//! Locating and invoking the FFmpeg tools.

use crate::error::{NarrateError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Resolved paths to ffmpeg and ffprobe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    /// Resolve both tools, preferring explicit paths over PATH lookup.
    pub fn locate(ffmpeg: Option<&Path>, ffprobe: Option<&Path>) -> Result<Self> {
        Ok(Self {
            ffmpeg: locate_tool("ffmpeg", ffmpeg)?,
            ffprobe: locate_tool("ffprobe", ffprobe)?,
        })
    }

    /// Use whatever `ffmpeg`/`ffprobe` the OS finds at spawn time.
    pub fn system() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    pub fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.kill_on_drop(true);
        cmd
    }

    pub fn ffprobe_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Check if FFmpeg runs.
    pub async fn is_ffmpeg_available(&self) -> bool {
        runs(self.ffmpeg_command()).await
    }

    /// Check if FFprobe runs.
    pub async fn is_ffprobe_available(&self) -> bool {
        runs(self.ffprobe_command()).await
    }
}

fn locate_tool(name: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => Err(NarrateError::CodecNotFound(path.display().to_string())),
        None => which::which(name).map_err(|_| NarrateError::CodecNotFound(name.to_string())),
    }
}

async fn runs(mut cmd: Command) -> bool {
    cmd.arg("-version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_path() {
        let err = FfmpegTools::locate(Some(Path::new("/nonexistent/ffmpeg")), None).unwrap_err();
        assert!(matches!(err, NarrateError::CodecNotFound(_)));
    }

    #[tokio::test]
    async fn test_availability_check_does_not_panic() {
        let tools = FfmpegTools::system();
        let _ = tools.is_ffmpeg_available().await;
        let _ = tools.is_ffprobe_available().await;
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let tools = FfmpegTools {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
        };
        assert!(!tools.is_ffmpeg_available().await);
        assert!(!tools.is_ffprobe_available().await);
    }
}
