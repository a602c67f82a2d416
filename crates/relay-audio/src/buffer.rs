//! Interleaved f32 sample buffer and the pure transforms applied before playback.

use std::time::Duration;

/// Fixed-length block of interleaved samples, shape `{frames × channels}`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples, normalized to -1.0..=1.0.
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// Build from per-frame rows (each row holds one sample per channel).
    pub fn from_frames(frames: &[Vec<f32>], sample_rate: u32) -> Self {
        let channels = frames.first().map(|f| f.len()).unwrap_or(1).max(1);
        let mut samples = Vec::with_capacity(frames.len() * channels);
        for frame in frames {
            samples.extend(frame.iter().copied().chain(std::iter::repeat(0.0)).take(channels));
        }
        Self::new(samples, channels as u16, sample_rate)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Column `channel` as a contiguous vector.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.samples
            .chunks_exact(self.channels as usize)
            .map(|frame| frame[channel])
            .collect()
    }

    /// Root-mean-square level over all samples.
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    /// Linear gain followed by a hard clip to the valid amplitude range.
    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.samples {
            *s = gain_clip(*s, gain);
        }
    }

    /// Reshape to `target` channels:
    /// - mono → C: every output column duplicates the mono column
    /// - K → 1: per-frame mean across the K columns
    /// - K → C (1 < C < K): first C columns
    /// - anything else is left unchanged
    pub fn reshape_channels(&mut self, target: u16) {
        let target = target.max(1) as usize;
        let current = self.channels as usize;
        if target == current {
            return;
        }
        let reshaped: Vec<f32> = if current == 1 {
            self.samples
                .iter()
                .flat_map(|&s| std::iter::repeat(s).take(target))
                .collect()
        } else if target == 1 {
            self.samples
                .chunks_exact(current)
                .map(|frame| frame.iter().sum::<f32>() / current as f32)
                .collect()
        } else if target < current {
            self.samples
                .chunks_exact(current)
                .flat_map(|frame| frame[..target].iter().copied())
                .collect()
        } else {
            return;
        };
        self.samples = reshaped;
        self.channels = target as u16;
    }
}

/// `clamp(sample · gain, -1.0, 1.0)`. A NaN product (e.g. 0 · ∞) maps to silence.
pub fn gain_clip(sample: f32, gain: f32) -> f32 {
    let v = sample * gain;
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-1.0, 1.0)
    }
}

/// Root-mean-square of a slice; 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upmix_duplicates_mono_column() {
        let mono = vec![0.1, -0.2, 0.3, 0.0];
        let mut buf = AudioBuffer::new(mono.clone(), 1, 44_100);
        buf.reshape_channels(4);
        assert_eq!(buf.channels, 4);
        assert_eq!(buf.frames(), 4);
        for c in 0..4 {
            assert_eq!(buf.channel(c), mono);
        }
    }

    #[test]
    fn downmix_keeps_leading_columns() {
        let frames = vec![
            vec![0.1, 0.2, 0.3, 0.4],
            vec![0.5, 0.6, 0.7, 0.8],
            vec![-0.1, -0.2, -0.3, -0.4],
        ];
        let mut buf = AudioBuffer::from_frames(&frames, 48_000);
        buf.reshape_channels(2);
        assert_eq!(buf.channels, 2);
        assert_eq!(buf.samples, vec![0.1, 0.2, 0.5, 0.6, -0.1, -0.2]);
    }

    #[test]
    fn downmix_to_mono_takes_frame_mean() {
        let frames = vec![vec![0.2, 0.4, 0.6], vec![-1.0, 0.0, 1.0]];
        let mut buf = AudioBuffer::from_frames(&frames, 48_000);
        buf.reshape_channels(1);
        assert_eq!(buf.channels, 1);
        assert_eq!(buf.frames(), 2);
        assert!((buf.samples[0] - 0.4).abs() < 1e-6);
        assert!(buf.samples[1].abs() < 1e-6);
    }

    #[test]
    fn reshape_to_more_channels_than_multichannel_source_is_noop() {
        let frames = vec![vec![0.1, 0.2], vec![0.3, 0.4]];
        let mut buf = AudioBuffer::from_frames(&frames, 48_000);
        let before = buf.clone();
        buf.reshape_channels(6);
        assert_eq!(buf, before);
    }

    #[test]
    fn gain_clip_matches_clamped_product() {
        assert_eq!(gain_clip(0.2, 3.0), 0.2 * 3.0);
        assert_eq!(gain_clip(0.5, 3.0), 1.0);
        assert_eq!(gain_clip(-0.5, 3.0), -1.0);
        assert_eq!(gain_clip(0.5, -4.0), -1.0);
        assert_eq!(gain_clip(0.0, f32::INFINITY), 0.0);
    }

    #[test]
    fn gain_clip_output_stays_in_range() {
        let samples = [
            -1e30, -3.5, -1.0, -0.75, -1e-9, 0.0, 1e-9, 0.33, 1.0, 2.0, 1e30, f32::MAX, f32::MIN,
        ];
        let gains = [
            -1e20, -10.0, -1.0, 0.0, 1e-6, 0.5, 1.0, 3.0, 100.0, 1e20, f32::MAX,
        ];
        for &s in &samples {
            for &g in &gains {
                let out = gain_clip(s, g);
                assert!((-1.0..=1.0).contains(&out), "s={s} g={g} out={out}");
            }
        }
    }

    #[test]
    fn apply_gain_touches_every_sample() {
        let mut buf = AudioBuffer::new(vec![0.1, 0.5, -0.9, 0.2], 2, 44_100);
        buf.apply_gain(3.0);
        let expected = [0.1f32 * 3.0, 1.0, -1.0, 0.2f32 * 3.0];
        for (a, b) in buf.samples.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        let buf = AudioBuffer::new(vec![0.5; 1000], 2, 48_000);
        assert!((buf.rms() - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn duration_follows_frames_and_rate() {
        let buf = AudioBuffer::new(vec![0.0; 96_000], 2, 48_000);
        assert_eq!(buf.frames(), 48_000);
        assert_eq!(buf.duration(), Duration::from_secs(1));
    }
}
