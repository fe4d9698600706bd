//! Chapter marks: timing derivation and FFmpeg chapter side files.
//!
//! Timing policy: a chapter starts at the summed duration of every buffer
//! before its first segment. A mark without an explicit end runs to the next
//! mark's start; the last one runs to the end of the track, or for one second
//! when the track length is unknown.

use super::metadata::escape_metadata_value;
use std::fmt::Write as _;
use std::path::Path;

/// Fallback length of a final chapter when the track duration is unknown.
const DEFAULT_LAST_CHAPTER_SECS: f64 = 1.0;

/// A named time range in the final audio, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMark {
    pub title: String,
    pub start: f64,
    pub end: Option<f64>,
}

impl ChapterMark {
    pub fn new(title: impl Into<String>, start: f64) -> Self {
        Self {
            title: title.into(),
            start,
            end: None,
        }
    }

    pub fn with_end(mut self, end: f64) -> Self {
        self.end = Some(end);
        self
    }
}

/// A chapter with both ends fixed, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSpan {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Build marks from per-buffer durations and chapter boundaries.
///
/// # Arguments
/// * `durations` - Duration of each buffer in seconds, in segment order
/// * `boundaries` - `(title, first buffer index)` per chapter, ascending
pub fn marks_from_durations(durations: &[f64], boundaries: &[(String, usize)]) -> Vec<ChapterMark> {
    let total: f64 = durations.iter().sum();
    let offset = |idx: usize| -> f64 { durations[..idx.min(durations.len())].iter().sum() };

    boundaries
        .iter()
        .enumerate()
        .map(|(i, (title, first))| {
            let end = match boundaries.get(i + 1) {
                Some((_, next)) => offset(*next),
                None => total,
            };
            ChapterMark::new(title.clone(), offset(*first)).with_end(end)
        })
        .collect()
}

/// Fill in missing ends and validate ordering.
///
/// Fails when starts are not strictly increasing, a time is negative or not
/// finite, or an explicit end does not come after its start.
pub fn resolve(marks: &[ChapterMark], total_secs: Option<f64>) -> Result<Vec<ChapterSpan>, String> {
    let mut spans = Vec::with_capacity(marks.len());

    for (i, mark) in marks.iter().enumerate() {
        if !mark.start.is_finite() || mark.start < 0.0 {
            return Err(format!("chapter '{}' has invalid start {}", mark.title, mark.start));
        }
        if i > 0 && mark.start <= marks[i - 1].start {
            return Err(format!(
                "chapter '{}' starts at {}s, not after '{}' at {}s",
                mark.title,
                mark.start,
                marks[i - 1].title,
                marks[i - 1].start
            ));
        }

        let end = match (mark.end, marks.get(i + 1), total_secs) {
            (Some(end), _, _) => end,
            (None, Some(next), _) => next.start,
            (None, None, Some(total)) if total > mark.start => total,
            (None, None, _) => mark.start + DEFAULT_LAST_CHAPTER_SECS,
        };
        if !end.is_finite() || end <= mark.start {
            return Err(format!(
                "chapter '{}' ends at {}s, not after its start {}s",
                mark.title, end, mark.start
            ));
        }

        spans.push(ChapterSpan {
            title: mark.title.clone(),
            start_ms: secs_to_ms(mark.start),
            end_ms: secs_to_ms(end),
        });
    }

    Ok(spans)
}

/// Render chapters in FFmpeg's FFMETADATA1 format.
pub fn render_ffmetadata(chapters: &[ChapterSpan]) -> String {
    let mut out = String::from(";FFMETADATA1\n");

    for chapter in chapters {
        // Writing into a String cannot fail.
        let _ = writeln!(out);
        let _ = writeln!(out, "[CHAPTER]");
        let _ = writeln!(out, "TIMEBASE=1/1000");
        let _ = writeln!(out, "START={}", chapter.start_ms);
        let _ = writeln!(out, "END={}", chapter.end_ms);
        let _ = writeln!(out, "title={}", escape_metadata_value(&chapter.title));
    }

    out
}

/// Write the chapter side file for the encoder.
pub fn write_chapter_file(chapters: &[ChapterSpan], path: &Path) -> std::io::Result<()> {
    std::fs::write(path, render_ffmetadata(chapters))
}

/// Expand a title template; `{n}` becomes the 1-based chapter number.
pub fn chapter_title(template: &str, number: usize) -> String {
    template.replace("{n}", &number.to_string())
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}
