//! End-to-end conversion: chunk, synthesize, retime and assemble.

use crate::audio::chapters::{self, ChapterMark};
use crate::audio::{AudioArtifact, AudioAssembler, MetadataRecord, Speed};
use crate::error::{NarrateError, Result};
use crate::scratch::ScratchDir;
use crate::text::{ChunkedDocument, ChunkerLimits, Document, TextChunker, TextSegment};
use crate::tts::VoiceSynthesizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Default chapter title template.
pub const DEFAULT_CHAPTER_TEMPLATE: &str = "Chapter {n}";

/// Fewest characters of chunked text worth narrating.
pub const MIN_TEXT_LENGTH: usize = 10;

/// How chapter marks are derived from the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChapterPolicy {
    /// No chapters.
    None,
    /// One chapter per section that produced audio.
    #[default]
    PerSection,
    /// One chapter per segment.
    PerSegment,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub limits: ChunkerLimits,
    pub speed: Speed,
    /// Segments synthesized at once; 1 is sequential
    pub concurrency: usize,
    pub chapter_policy: ChapterPolicy,
    /// Title for untitled chapters, `{n}` is the 1-based chapter number
    pub chapter_title_template: String,
    /// Parent for the scratch directory; the system temp dir when unset
    pub scratch_root: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            limits: ChunkerLimits::default(),
            speed: Speed::default(),
            concurrency: 1,
            chapter_policy: ChapterPolicy::default(),
            chapter_title_template: DEFAULT_CHAPTER_TEMPLATE.to_string(),
            scratch_root: None,
        }
    }
}

/// One synthesized, retimed segment on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChunk {
    pub index: usize,
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// All segment audio for a document, in playback order.
///
/// The chunk files live in a scratch directory that is deleted when this
/// value is dropped.
#[derive(Debug)]
pub struct RenderedBook {
    scratch: Arc<ScratchDir>,
    chunks: Vec<RenderedChunk>,
    chapters: Vec<ChapterMark>,
}

impl RenderedBook {
    pub fn chunks(&self) -> &[RenderedChunk] {
        &self.chunks
    }

    pub fn chapters(&self) -> &[ChapterMark] {
        &self.chapters
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.chunks.iter().map(|c| c.path.clone()).collect()
    }

    pub fn duration_secs(&self) -> f64 {
        self.chunks.iter().map(|c| c.duration_secs).sum()
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }
}

type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Converts documents into audiobooks with one voice and one encoder setup.
pub struct Pipeline {
    synthesizer: VoiceSynthesizer,
    assembler: AudioAssembler,
    options: PipelineOptions,
    progress: Option<ProgressFn>,
}

impl Pipeline {
    pub fn new(
        synthesizer: VoiceSynthesizer,
        assembler: AudioAssembler,
        options: PipelineOptions,
    ) -> Self {
        Self {
            synthesizer,
            assembler,
            options,
            progress: None,
        }
    }

    /// Called with `(segments done, total segments)` after each segment.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Chunk a document into segments without synthesizing anything.
    pub fn chunk(&self, document: &Document) -> ChunkedDocument {
        TextChunker::new(self.options.limits).chunk_sections(&document.sections)
    }

    /// Convert a document into an audiobook at `destination`.
    ///
    /// Dropping the returned future before it completes leaves nothing at
    /// the destination and removes all intermediate files.
    pub async fn run(
        &self,
        document: &Document,
        metadata: &MetadataRecord,
        destination: &Path,
    ) -> Result<AudioArtifact> {
        let rendered = self.render(document).await?;

        let chapters = match rendered.chapters() {
            [] => None,
            marks => Some(marks),
        };

        self.assembler
            .assemble(&rendered.paths(), metadata, chapters, destination)
            .await
    }

    /// Chunk a document and reject it when there is too little to narrate.
    pub fn prepare(&self, document: &Document) -> Result<ChunkedDocument> {
        let chunked = self.chunk(document);
        if chunked.segments.is_empty() {
            return Err(NarrateError::EmptyText);
        }

        let len: usize = chunked
            .segments
            .iter()
            .map(|s| s.text.chars().count())
            .sum();
        if len < MIN_TEXT_LENGTH {
            return Err(NarrateError::TextTooShort {
                len,
                min: MIN_TEXT_LENGTH,
            });
        }

        Ok(chunked)
    }

    /// Synthesize and retime every segment into scratch WAV files.
    pub async fn render(&self, document: &Document) -> Result<RenderedBook> {
        let chunked = self.prepare(document)?;

        log::info!(
            "Synthesizing {} segment(s) from {} section(s) with {} (speed {})",
            chunked.segments.len(),
            chunked.section_starts.len(),
            self.synthesizer.model_name(),
            self.options.speed.value()
        );

        let scratch = Arc::new(ScratchDir::new(self.options.scratch_root.as_deref())?);
        let chunks = self.synthesize_all(&chunked.segments, &scratch).await?;

        let durations: Vec<f64> = chunks.iter().map(|c| c.duration_secs).collect();
        let chapters = self.chapter_marks(document, &chunked, &durations);

        Ok(RenderedBook {
            scratch,
            chunks,
            chapters,
        })
    }

    /// Run synthesis on at most `concurrency` segments at once.
    ///
    /// Results are slotted by segment index so playback order never depends
    /// on completion order. The first failure aborts the remaining work.
    async fn synthesize_all(
        &self,
        segments: &[TextSegment],
        scratch: &Arc<ScratchDir>,
    ) -> Result<Vec<RenderedChunk>> {
        let total = segments.len();
        let concurrency = self.options.concurrency.max(1);
        let mut slots: Vec<Option<RenderedChunk>> = vec![None; total];
        let mut pending = segments.iter();
        let mut tasks = JoinSet::new();
        let mut done = 0;

        loop {
            while tasks.len() < concurrency {
                let Some(segment) = pending.next() else {
                    break;
                };
                let synthesizer = self.synthesizer.clone();
                let speed = self.options.speed;
                let segment = segment.clone();
                let scratch = Arc::clone(scratch);
                tasks.spawn(async move {
                    let result = render_segment(&synthesizer, speed, &segment, scratch).await;
                    (segment.index, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (index, result) = joined.map_err(|e| {
                if e.is_cancelled() {
                    NarrateError::Cancelled
                } else {
                    NarrateError::Io(std::io::Error::other(format!(
                        "synthesis task failed: {}",
                        e
                    )))
                }
            })?;

            let chunk = match result {
                Ok(chunk) => chunk,
                Err(e) => {
                    log::error!("Segment {} failed: {}", index, e);
                    tasks.abort_all();
                    return Err(e);
                }
            };

            match slots.get_mut(index) {
                Some(slot) => *slot = Some(chunk),
                None => {
                    tasks.abort_all();
                    return Err(NarrateError::Io(std::io::Error::other(format!(
                        "segment index {} out of range",
                        index
                    ))));
                }
            }

            done += 1;
            if let Some(ref progress) = self.progress {
                progress(done, total);
            }
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(NarrateError::Cancelled)
    }

    fn chapter_marks(
        &self,
        document: &Document,
        chunked: &ChunkedDocument,
        durations: &[f64],
    ) -> Vec<ChapterMark> {
        let template = &self.options.chapter_title_template;

        let boundaries: Vec<(String, usize)> = match self.options.chapter_policy {
            ChapterPolicy::None => return Vec::new(),
            ChapterPolicy::PerSection => chunked
                .section_starts
                .iter()
                .enumerate()
                .map(|(n, &(section, first))| {
                    let title = document
                        .sections
                        .get(section)
                        .and_then(|s| s.title.as_deref())
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| chapters::chapter_title(template, n + 1));
                    (title, first)
                })
                .collect(),
            ChapterPolicy::PerSegment => (0..chunked.segments.len())
                .map(|i| (chapters::chapter_title(template, i + 1), i))
                .collect(),
        };

        // Silent segments would give zero-length chapters.
        chapters::marks_from_durations(durations, &boundaries)
            .into_iter()
            .filter(|m| m.end.is_some_and(|end| end > m.start))
            .collect()
    }
}

/// The blocking write holds its own handle on the scratch dir, which outlives
/// any write still running after the task is aborted.
async fn render_segment(
    synthesizer: &VoiceSynthesizer,
    speed: Speed,
    segment: &TextSegment,
    scratch: Arc<ScratchDir>,
) -> Result<RenderedChunk> {
    let path = scratch.chunk_path(segment.index);
    let buffer = synthesizer.synthesize(segment).await?;
    let buffer = speed.apply(buffer);
    let duration_secs = buffer.duration_secs();

    tokio::task::spawn_blocking({
        let path = path.clone();
        move || {
            let written = buffer.write_wav(&path);
            drop(scratch);
            written
        }
    })
    .await
    .map_err(|e| std::io::Error::other(format!("WAV write task failed: {}", e)))??;

    log::debug!(
        "Segment {} rendered: {:.2}s -> {}",
        segment.index,
        duration_secs,
        path.display()
    );

    Ok(RenderedChunk {
        index: segment.index,
        path,
        duration_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EncodeSettings, FfmpegTools, PcmBuffer};
    use crate::error::ErrorKind;
    use crate::tts::MockVoice;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn offline_assembler() -> AudioAssembler {
        let tools = FfmpegTools {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe"),
        };
        AudioAssembler::new(tools, EncodeSettings::default())
    }

    fn pipeline(voice: MockVoice, options: PipelineOptions) -> Pipeline {
        Pipeline::new(
            VoiceSynthesizer::new(Arc::new(voice)),
            offline_assembler(),
            options,
        )
    }

    fn small_limits() -> ChunkerLimits {
        ChunkerLimits::new(5, 40).unwrap()
    }

    fn many_paragraphs(n: usize) -> String {
        (0..n)
            .map(|i| format!("Paragraph number {} is here.", i))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[tokio::test]
    async fn test_empty_document() {
        let p = pipeline(MockVoice::new(8000), PipelineOptions::default());
        let err = p.render(&Document::from_text("  \n\n \x0c ")).await.unwrap_err();
        assert!(matches!(err, NarrateError::EmptyText));
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[tokio::test]
    async fn test_short_text_rejected() {
        let voice = Arc::new(MockVoice::new(8000));
        let p = Pipeline::new(
            VoiceSynthesizer::new(voice.clone()),
            offline_assembler(),
            PipelineOptions::default(),
        );

        let err = p.render(&Document::from_text("  Hi.  ")).await.unwrap_err();
        assert!(matches!(err, NarrateError::TextTooShort { len: 3, min: 10 }));
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(voice.call_count(), 0);

        let out_dir = TempDir::new().unwrap();
        let dest = out_dir.path().join("book.m4b");
        let err = p
            .run(&Document::from_text("Hi."), &MetadataRecord::new(), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, NarrateError::TextTooShort { .. }));
        assert!(!dest.exists());

        assert!(p.prepare(&Document::from_text("Ten chars.")).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_output_matches_sequential() {
        let text = many_paragraphs(12);
        let doc = Document::from_text(&text);

        let sequential = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                limits: small_limits(),
                ..PipelineOptions::default()
            },
        );
        let voice = Arc::new(MockVoice::new(8000).with_delay(Duration::from_millis(5)));
        let concurrent = Pipeline::new(
            VoiceSynthesizer::new(voice.clone()),
            offline_assembler(),
            PipelineOptions {
                limits: small_limits(),
                concurrency: 4,
                ..PipelineOptions::default()
            },
        );

        let a = sequential.render(&doc).await.unwrap();
        let b = concurrent.render(&doc).await.unwrap();

        assert_eq!(a.chunks().len(), 12);
        assert_eq!(b.chunks().len(), 12);
        for (x, y) in a.chunks().iter().zip(b.chunks()) {
            assert_eq!(x.index, y.index);
            let xs = PcmBuffer::read_wav(x.index, &x.path).unwrap();
            let ys = PcmBuffer::read_wav(y.index, &y.path).unwrap();
            assert_eq!(xs, ys);
        }
        assert!(voice.peak_in_flight() <= 4);
        assert!(voice.peak_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_chunks_in_segment_order() {
        let doc = Document::from_text(&many_paragraphs(5));
        let p = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                limits: small_limits(),
                concurrency: 3,
                ..PipelineOptions::default()
            },
        );

        let rendered = p.render(&doc).await.unwrap();
        let indices: Vec<usize> = rendered.chunks().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        for chunk in rendered.chunks() {
            assert!(chunk.path.exists());
            assert!(chunk.duration_secs > 0.0);
        }
    }

    #[tokio::test]
    async fn test_speed_shortens_audio() {
        let doc = Document::from_text("Some words to speak aloud.");
        let normal = pipeline(MockVoice::new(8000), PipelineOptions::default());
        let fast = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                speed: Speed::new(2.0),
                ..PipelineOptions::default()
            },
        );

        let a = normal.render(&doc).await.unwrap().duration_secs();
        let b = fast.render(&doc).await.unwrap().duration_secs();
        assert!((b - a / 2.0).abs() < 0.01, "{} vs {}", a, b);
    }

    #[tokio::test]
    async fn test_failure_aborts_run() {
        let doc = Document::from_text(&format!("{}\n\nthis one is broken.", many_paragraphs(3)));
        let root = TempDir::new().unwrap();
        let p = pipeline(
            MockVoice::new(8000).failing_on("broken"),
            PipelineOptions {
                limits: small_limits(),
                scratch_root: Some(root.path().to_path_buf()),
                ..PipelineOptions::default()
            },
        );

        let err = p.render(&doc).await.unwrap_err();
        match err {
            NarrateError::SynthesisFailed { index, .. } => assert_eq!(index, 3),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_progress_reported() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let p = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                limits: small_limits(),
                ..PipelineOptions::default()
            },
        )
        .with_progress(move |done, total| {
            assert!(done <= total);
            assert_eq!(total, 4);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        p.render(&Document::from_text(&many_paragraphs(4))).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_section_chapters() {
        let mut doc = Document::default();
        doc.push(Some("Opening".to_string()), many_paragraphs(2));
        doc.push(None, "   ");
        doc.push(None, many_paragraphs(3));

        let p = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                limits: small_limits(),
                ..PipelineOptions::default()
            },
        );
        let rendered = p.render(&doc).await.unwrap();
        let marks = rendered.chapters();

        assert_eq!(marks.len(), 2);
        assert_eq!(marks[0].title, "Opening");
        assert_eq!(marks[1].title, "Chapter 2");
        assert_eq!(marks[0].start, 0.0);

        let first_two: f64 = rendered.chunks()[..2].iter().map(|c| c.duration_secs).sum();
        assert!((marks[1].start - first_two).abs() < 1e-9);
        assert!((marks[1].end.unwrap() - rendered.duration_secs()).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_segment_chapters_and_none() {
        let doc = Document::from_text(&many_paragraphs(3));

        let per_segment = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                limits: small_limits(),
                chapter_policy: ChapterPolicy::PerSegment,
                chapter_title_template: "Part {n}".to_string(),
                ..PipelineOptions::default()
            },
        );
        let rendered = per_segment.render(&doc).await.unwrap();
        let titles: Vec<&str> = rendered.chapters().iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Part 1", "Part 2", "Part 3"]);
        assert!(rendered.chapters().windows(2).all(|w| w[0].start < w[1].start));

        let none = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                limits: small_limits(),
                chapter_policy: ChapterPolicy::None,
                ..PipelineOptions::default()
            },
        );
        assert!(none.render(&doc).await.unwrap().chapters().is_empty());
    }

    #[tokio::test]
    async fn test_silent_segments_get_no_chapter() {
        let doc = Document::from_text(&many_paragraphs(3));
        let p = pipeline(
            MockVoice::new(8000).with_fragments(Vec::new()),
            PipelineOptions {
                limits: small_limits(),
                chapter_policy: ChapterPolicy::PerSegment,
                ..PipelineOptions::default()
            },
        );

        let rendered = p.render(&doc).await.unwrap();
        assert_eq!(rendered.chunks().len(), 3);
        assert!(rendered.chapters().is_empty());
    }

    #[tokio::test]
    async fn test_scratch_removed_after_render_dropped() {
        let root = TempDir::new().unwrap();
        let p = pipeline(
            MockVoice::new(8000),
            PipelineOptions {
                scratch_root: Some(root.path().to_path_buf()),
                ..PipelineOptions::default()
            },
        );

        let rendered = p.render(&Document::from_text("Hello there.")).await.unwrap();
        assert!(rendered.scratch_path().exists());
        drop(rendered);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_segment_write_outlives_released_scratch() {
        let root = TempDir::new().unwrap();
        let synthesizer = VoiceSynthesizer::new(Arc::new(
            MockVoice::new(8000).with_delay(Duration::from_millis(50)),
        ));
        let scratch = Arc::new(ScratchDir::new(Some(root.path())).unwrap());
        let segment = TextSegment {
            index: 0,
            text: "Written after release.".to_string(),
        };

        let task = tokio::spawn({
            let scratch = Arc::clone(&scratch);
            async move { render_segment(&synthesizer, Speed::default(), &segment, scratch).await }
        });
        drop(scratch);

        let chunk = task.await.unwrap().unwrap();
        assert!(chunk.duration_secs > 0.0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_nothing() {
        let root = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let dest = out_dir.path().join("book.m4b");

        let p = pipeline(
            MockVoice::new(8000).with_delay(Duration::from_millis(200)),
            PipelineOptions {
                limits: small_limits(),
                scratch_root: Some(root.path().to_path_buf()),
                ..PipelineOptions::default()
            },
        );

        let doc = Document::from_text(&many_paragraphs(10));
        let result = tokio::time::timeout(
            Duration::from_millis(300),
            p.run(&doc, &MetadataRecord::new(), &dest),
        )
        .await;

        assert!(result.is_err());
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(out_dir.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_without_encoder_fails_cleanly() {
        let out_dir = TempDir::new().unwrap();
        let dest = out_dir.path().join("book.m4b");
        let p = pipeline(MockVoice::new(8000), PipelineOptions::default());

        let err = p
            .run(
                &Document::from_text("Hello there, world."),
                &MetadataRecord::new(),
                &dest,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NarrateError::CodecNotFound(_)));
        assert!(!dest.exists());
    }
}
