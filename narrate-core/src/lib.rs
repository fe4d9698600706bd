//! narrate-core - turn plain text into a chaptered, tagged M4B audiobook.
//!
//! Text is split into [`text::TextSegment`]s, each segment is spoken by a
//! [`tts::VoiceModel`], retimed by [`audio::Speed`], and the results are
//! concatenated and encoded by [`audio::AudioAssembler`]. [`Pipeline`] drives
//! the whole run.
//!
//! # Example
//!
//! ```no_run
//! use narrate_core::{
//!     AudioAssembler, Document, EncodeSettings, FfmpegTools, MetadataRecord, Pipeline,
//!     PipelineOptions, PiperVoice, VoiceSynthesizer,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> narrate_core::Result<()> {
//! let voice = PiperVoice::load(Path::new("en_US-lessac-medium.onnx"), None)?;
//! let pipeline = Pipeline::new(
//!     VoiceSynthesizer::new(Arc::new(voice)),
//!     AudioAssembler::new(FfmpegTools::locate(None, None)?, EncodeSettings::default()),
//!     PipelineOptions::default(),
//! );
//!
//! let metadata = MetadataRecord::new().with_title("Book").with_author("Author");
//! let artifact = pipeline
//!     .run(&Document::from_text("Hello world."), &metadata, Path::new("book.m4b"))
//!     .await?;
//! println!("{:.1}s written to {}", artifact.duration_secs, artifact.path.display());
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
mod scratch;
pub mod text;
pub mod tts;

pub use audio::{
    AudioArtifact, AudioAssembler, ChapterMark, Degradation, EncodeSettings, FfmpegTools,
    MetadataRecord, PcmBuffer, ProbeReport, Speed,
};
pub use config::NarrateConfig;
pub use error::{ErrorKind, NarrateError, Result};
pub use pipeline::{ChapterPolicy, Pipeline, PipelineOptions, RenderedBook};
pub use text::{ChunkerLimits, Document, TextChunker, TextSegment};
pub use tts::{AudioFragment, MockVoice, PiperVoice, VoiceModel, VoiceSynthesizer};
