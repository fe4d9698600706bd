//! Mock voice model for testing
//!
//! Produces deterministic audio without any external engine and can simulate
//! slow synthesis, failures and odd fragment shapes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{AudioFragment, VoiceModel};
use crate::error::{NarrateError, Result};

/// Samples generated per character of input text.
const DEFAULT_SAMPLES_PER_CHAR: usize = 64;

/// A deterministic in-process voice model.
pub struct MockVoice {
    sample_rate: u32,
    samples_per_char: usize,
    /// Fixed fragments returned for every call instead of generated audio
    fragments: Option<Vec<AudioFragment>>,
    /// Texts containing this marker fail
    fail_on: Option<String>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockVoice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples_per_char: DEFAULT_SAMPLES_PER_CHAR,
            fragments: None,
            fail_on: None,
            delay: None,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_samples_per_char(mut self, n: usize) -> Self {
        self.samples_per_char = n;
        self
    }

    /// Return these fragments for every call.
    pub fn with_fragments(mut self, fragments: Vec<AudioFragment>) -> Self {
        self.fragments = Some(fragments);
        self
    }

    /// Fail any text that contains `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Calls currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// One fragment per word; each character becomes a short square wave
    /// whose level depends on the character.
    fn generate(&self, text: &str) -> Vec<AudioFragment> {
        text.split_whitespace()
            .map(|word| {
                let mut samples = Vec::with_capacity(word.len() * self.samples_per_char);
                for c in word.chars() {
                    let level = ((c as u32 % 64) as i16 + 1) * 256;
                    for i in 0..self.samples_per_char {
                        samples.push(if (i / 8) % 2 == 0 { level } else { -level });
                    }
                }
                AudioFragment::Int16Samples(samples)
            })
            .collect()
    }
}

/// Counts one running call; released on drop, including when the call's
/// future is dropped mid-sleep.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    now: usize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter, now }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceModel for MockVoice {
    async fn synthesize(&self, text: &str) -> Result<Vec<AudioFragment>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight::enter(&self.in_flight);
        self.peak_in_flight.fetch_max(guard.now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        drop(guard);

        if let Some(ref marker) = self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(NarrateError::SynthesisFailed {
                    index: 0,
                    stderr: format!("mock failure on '{}'", marker),
                });
            }
        }

        match self.fragments {
            Some(ref fragments) => Ok(fragments.clone()),
            None => Ok(self.generate(text)),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_length() {
        let voice = MockVoice::new(8000).with_samples_per_char(10);
        let fragments = voice.synthesize("ab cde").await.unwrap();
        assert_eq!(fragments.len(), 2);

        let total: usize = fragments
            .into_iter()
            .map(|f| f.into_samples().unwrap().len())
            .sum();
        assert_eq!(total, 50);
        assert_eq!(voice.call_count(), 1);
    }

    #[tokio::test]
    async fn test_deterministic() {
        let voice = MockVoice::new(8000);
        let a = voice.synthesize("same text").await.unwrap();
        let b = voice.synthesize("same text").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_failing_on() {
        let voice = MockVoice::new(8000).failing_on("bad");
        assert!(voice.synthesize("good").await.is_ok());
        assert!(voice.synthesize("this is bad").await.is_err());
        assert_eq!(voice.call_count(), 2);
    }

    #[tokio::test]
    async fn test_in_flight_released_when_call_dropped() {
        let voice = MockVoice::new(8000).with_delay(Duration::from_secs(5));
        let result =
            tokio::time::timeout(Duration::from_millis(20), voice.synthesize("slow")).await;

        assert!(result.is_err());
        assert_eq!(voice.call_count(), 1);
        assert_eq!(voice.peak_in_flight(), 1);
        assert_eq!(voice.in_flight(), 0);
    }
}
