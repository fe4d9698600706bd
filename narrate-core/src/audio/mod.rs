//! Audio handling: PCM buffers, speed, chapters, tags and M4B assembly.

pub mod assembler;
pub mod chapters;
pub mod ffmpeg;
pub mod metadata;
pub mod pcm;
pub mod probe;
pub mod speed;

pub use assembler::{AudioArtifact, AudioAssembler, Degradation, EncodeSettings, concatenate_wavs};
pub use chapters::{ChapterMark, ChapterSpan};
pub use ffmpeg::FfmpegTools;
pub use metadata::MetadataRecord;
pub use pcm::{PcmBuffer, concat_pcm};
pub use probe::{ProbeReport, probe};
pub use speed::{MAX_SPEED, MIN_SPEED, Speed};
