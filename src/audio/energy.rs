// Loudness measurement for speech gating
//
// RMS is reported on the 8-bit-centered scale used by typical analyser
// taps (one unit = 256 in 16-bit PCM), so readings fall in [0, 128].

use std::collections::VecDeque;

/// Default analysis window in samples
pub const DEFAULT_WINDOW: usize = 512;

/// 16-bit PCM units per 8-bit-centered unit
const PCM16_PER_UNIT: f32 = 256.0;

/// Computes the RMS loudness of an analysis window
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyDetector;

impl EnergyDetector {
    /// RMS of `samples` in 8-bit-centered units.
    ///
    /// Returns `None` for an empty buffer ("no reading").
    pub fn rms(samples: &[i16]) -> Option<f32> {
        if samples.is_empty() {
            return None;
        }

        let sum_sq: f64 = samples
            .iter()
            .map(|&s| {
                let v = s as f64 / PCM16_PER_UNIT as f64;
                v * v
            })
            .sum();

        Some((sum_sq / samples.len() as f64).sqrt() as f32)
    }
}

/// Rolling buffer of the most recent samples fed to the detector
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    capacity: usize,
    samples: VecDeque<i16>,
}

impl AnalysisWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append samples, keeping only the newest `capacity`
    pub fn push(&mut self, samples: &[i16]) {
        if self.capacity == 0 {
            return;
        }

        let tail = if samples.len() > self.capacity {
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let overflow = (self.samples.len() + tail.len()).saturating_sub(self.capacity);
        self.samples.drain(..overflow);
        self.samples.extend(tail.iter().copied());
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.samples.len() == self.capacity
    }

    /// Measure the window; `None` until a full window has been captured
    pub fn measure(&self) -> Option<f32> {
        if !self.is_full() {
            return None;
        }

        let (front, back) = self.samples.as_slices();
        if back.is_empty() {
            return EnergyDetector::rms(front);
        }

        let contiguous: Vec<i16> = self.samples.iter().copied().collect();
        EnergyDetector::rms(&contiguous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(EnergyDetector::rms(&[0; 512]), Some(0.0));
    }

    #[test]
    fn test_rms_empty_buffer_is_no_reading() {
        assert_eq!(EnergyDetector::rms(&[]), None);
    }

    #[test]
    fn test_rms_constant_amplitude() {
        // 5 units on the 8-bit scale, alternating sign
        let samples: Vec<i16> = (0..512).map(|i| if i % 2 == 0 { 1280 } else { -1280 }).collect();
        let rms = EnergyDetector::rms(&samples).unwrap();
        assert!((rms - 5.0).abs() < 1e-4, "got {}", rms);
    }

    #[test]
    fn test_rms_full_scale_stays_in_range() {
        let rms = EnergyDetector::rms(&[i16::MIN; 64]).unwrap();
        assert!((rms - 128.0).abs() < 1e-4);
    }

    #[test]
    fn test_window_needs_full_buffer() {
        let mut window = AnalysisWindow::new(4);
        window.push(&[2560, 2560]);
        assert!(!window.is_full());
        assert_eq!(window.measure(), None);

        window.push(&[2560, 2560]);
        assert!(window.is_full());
        assert_eq!(window.measure(), Some(10.0));
    }

    #[test]
    fn test_window_keeps_newest_samples() {
        let mut window = AnalysisWindow::new(4);
        window.push(&[0, 0, 0, 0]);
        window.push(&[5120, 5120]);
        window.push(&[5120, 5120, 5120]);

        // Only the newest four samples (all 20 units) are measured
        assert_eq!(window.measure(), Some(20.0));
    }
}
