use super::VoiceModel;
use crate::audio::PcmBuffer;
use crate::error::{NarrateError, Result};
use crate::text::TextSegment;
use std::sync::Arc;

/// Turns text segments into PCM using a shared, pre-loaded voice model.
#[derive(Clone)]
pub struct VoiceSynthesizer {
    model: Arc<dyn VoiceModel>,
}

impl VoiceSynthesizer {
    pub fn new(model: Arc<dyn VoiceModel>) -> Self {
        Self { model }
    }

    pub fn sample_rate(&self) -> u32 {
        self.model.sample_rate()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Synthesize one segment.
    ///
    /// Fragments are appended in the order the model yields them. Any
    /// fragment that is not 16-bit PCM fails the whole segment.
    pub async fn synthesize(&self, segment: &TextSegment) -> Result<PcmBuffer> {
        let fragments = self
            .model
            .synthesize(&segment.text)
            .await
            .map_err(|e| match e {
                NarrateError::SynthesisFailed { stderr, .. } => NarrateError::SynthesisFailed {
                    index: segment.index,
                    stderr,
                },
                other => other,
            })?;

        let fragment_count = fragments.len();
        let mut samples = Vec::new();
        for fragment in fragments {
            let part = fragment
                .into_samples()
                .map_err(|detail| NarrateError::UnsupportedAudioFormat {
                    index: segment.index,
                    detail,
                })?;
            samples.extend(part);
        }

        log::debug!(
            "Segment {}: {} fragment(s), {} samples",
            segment.index,
            fragment_count,
            samples.len()
        );

        Ok(PcmBuffer::new(segment.index, self.sample_rate(), samples))
    }
}
