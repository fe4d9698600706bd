//! Mono 16-bit PCM buffers and their WAV representation.

use crate::error::{NarrateError, Result};
use std::io::Cursor;
use std::path::Path;

/// Mono, signed 16-bit samples derived from one text segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    /// Index of the segment this audio was synthesized from
    pub index: usize,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl PcmBuffer {
    pub fn new(index: usize, sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            index,
            sample_rate,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        samples_to_secs(self.samples.len() as u64, self.sample_rate)
    }

    /// Encode as an in-memory WAV file.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(self.sample_rate))?;
            let mut samples = writer.get_i16_writer(self.samples.len() as u32);
            for &s in &self.samples {
                samples.write_sample(s);
            }
            samples.flush()?;
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Write as a WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let mut writer = hound::WavWriter::create(path, wav_spec(self.sample_rate))?;
        for &s in &self.samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Read a mono 16-bit WAV file.
    pub fn read_wav(index: usize, path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        check_pcm16_mono(&spec, path)?;
        let samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(index, spec.sample_rate, samples))
    }
}

pub(crate) fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

pub(crate) fn check_pcm16_mono(spec: &hound::WavSpec, path: &Path) -> Result<()> {
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(NarrateError::FormatMismatch(format!(
            "{} is {} channel(s), {}-bit {:?}; expected mono 16-bit PCM",
            path.display(),
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        )));
    }
    Ok(())
}

pub(crate) fn samples_to_secs(samples: u64, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / sample_rate as f64
}

/// Concatenate buffers in order into one continuous buffer.
///
/// All buffers must share a sample rate. The result carries the index of the
/// first buffer.
pub fn concat_pcm(buffers: &[PcmBuffer]) -> Result<PcmBuffer> {
    let first = buffers.first().ok_or(NarrateError::NoAudio)?;

    if let Some(other) = buffers.iter().find(|b| b.sample_rate != first.sample_rate) {
        return Err(NarrateError::FormatMismatch(format!(
            "segment {} is {} Hz but segment {} is {} Hz",
            first.index, first.sample_rate, other.index, other.sample_rate
        )));
    }

    let total = buffers.iter().map(|b| b.samples.len()).sum();
    let mut samples = Vec::with_capacity(total);
    for buffer in buffers {
        samples.extend_from_slice(&buffer.samples);
    }

    Ok(PcmBuffer::new(first.index, first.sample_rate, samples))
}
