//! Voice model trait and the synthesizer built on top of it.

pub mod fragment;
pub mod mock;
pub mod piper;
mod synthesizer;

pub use fragment::AudioFragment;
pub use mock::MockVoice;
pub use piper::PiperVoice;
pub use synthesizer::VoiceSynthesizer;

use crate::error::Result;
use async_trait::async_trait;

/// A loaded voice model - all TTS engines implement this.
///
/// The model is loaded once per run and shared across every segment, so
/// `synthesize` must be safe to call repeatedly and from several tasks.
#[async_trait]
pub trait VoiceModel: Send + Sync {
    /// Synthesize text into audio fragments, in playback order.
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioFragment>>;

    /// Output sample rate, fixed by the model.
    fn sample_rate(&self) -> u32;

    /// Model name for display.
    fn name(&self) -> &str;
}
