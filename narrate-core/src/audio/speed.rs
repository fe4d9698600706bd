//! Playback speed adjustment by nearest-neighbour resampling.
//!
//! Pitch is not preserved: faster speech also sounds higher.

use super::PcmBuffer;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;
pub const DEFAULT_SPEED: f32 = 1.0;

/// A speed multiplier guaranteed to lie within `[MIN_SPEED, MAX_SPEED]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed {
    value: f32,
    requested: f32,
}

impl Speed {
    /// Clamp a requested speed into range, warning when it had to change.
    pub fn new(requested: f32) -> Self {
        let value = if requested.is_finite() {
            requested.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            DEFAULT_SPEED
        };

        if value != requested {
            log::warn!(
                "Speed adjusted to {} (valid range: {}-{})",
                value,
                MIN_SPEED,
                MAX_SPEED
            );
        }

        Self { value, requested }
    }

    /// The effective speed.
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn requested(&self) -> f32 {
        self.requested
    }

    pub fn was_clamped(&self) -> bool {
        self.value != self.requested
    }

    pub fn is_identity(&self) -> bool {
        self.value == 1.0
    }

    /// Resample a buffer. Speed 1.0 hands the buffer back untouched.
    pub fn apply(&self, buffer: PcmBuffer) -> PcmBuffer {
        if self.is_identity() {
            return buffer;
        }

        let samples = resample(&buffer.samples, self.value as f64);
        PcmBuffer::new(buffer.index, buffer.sample_rate, samples)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

/// Take `samples[floor(k * step)]` for k = 0, 1, 2, ... while in bounds.
fn resample(samples: &[i16], step: f64) -> Vec<i16> {
    let len = samples.len();
    let out_len = (len as f64 / step).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    let mut k = 0usize;
    loop {
        let idx = (k as f64 * step) as usize;
        if idx >= len {
            break;
        }
        out.push(samples[idx]);
        k += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(n: usize) -> PcmBuffer {
        PcmBuffer::new(0, 22050, (0..n as i16).collect())
    }

    #[test]
    fn test_identity() {
        let buffer = ramp(100);
        let out = Speed::new(1.0).apply(buffer.clone());
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_double_speed_takes_every_other_sample() {
        let out = Speed::new(2.0).apply(ramp(7));
        assert_eq!(out.samples, vec![0, 2, 4, 6]);
    }

    #[test]
    fn test_half_speed_repeats_samples() {
        let out = Speed::new(0.5).apply(ramp(3));
        assert_eq!(out.samples, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_fractional_speed() {
        // indices 0, 1.5, 3.0, 4.5 -> 0, 1, 3, 4
        let out = Speed::new(1.5).apply(ramp(6));
        assert_eq!(out.samples, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_clamping() {
        let fast = Speed::new(5.0);
        assert_eq!(fast.value(), MAX_SPEED);
        assert!(fast.was_clamped());

        let slow = Speed::new(0.1);
        assert_eq!(slow.value(), MIN_SPEED);
        assert_eq!(slow.requested(), 0.1);

        let ok = Speed::new(1.25);
        assert_eq!(ok.value(), 1.25);
        assert!(!ok.was_clamped());
    }

    #[test]
    fn test_non_finite_falls_back_to_default() {
        let speed = Speed::new(f32::NAN);
        assert_eq!(speed.value(), DEFAULT_SPEED);
        assert!(speed.was_clamped());
    }

    #[test]
    fn test_empty_buffer() {
        assert!(Speed::new(1.5).apply(ramp(0)).is_empty());
    }

    #[test]
    fn test_keeps_index_and_rate() {
        let buffer = PcmBuffer::new(9, 16000, vec![1, 2, 3, 4]);
        let out = Speed::new(2.0).apply(buffer);
        assert_eq!(out.index, 9);
        assert_eq!(out.sample_rate, 16000);
    }

    proptest! {
        #[test]
        fn prop_length_scales_inversely(len in 0usize..5000, speed in MIN_SPEED..=MAX_SPEED) {
            let out = Speed::new(speed).apply(ramp(len));
            let expected = len as f64 / Speed::new(speed).value() as f64;
            prop_assert!((out.len() as f64 - expected).abs() <= 1.0);
        }

        #[test]
        fn prop_deterministic(len in 0usize..2000, speed in MIN_SPEED..=MAX_SPEED) {
            let a = Speed::new(speed).apply(ramp(len));
            let b = Speed::new(speed).apply(ramp(len));
            prop_assert_eq!(a, b);
        }
    }
}
