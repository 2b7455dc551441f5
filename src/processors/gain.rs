use crate::config::VoiceParams;
use crate::error::Result;
use crate::messages::{AudioFrame, Samples};
use super::AudioProcessor;

/// Scales integer samples by `volume`, saturating at the 16-bit range.
/// The product is truncated toward zero after clamping.
pub fn apply_volume(samples: &[i16], volume: f32) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = s as f32 * volume;
            scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

/// Gain stage. Runs whenever the volume differs from unity.
pub struct GainProcessor;

impl GainProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GainProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProcessor for GainProcessor {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn is_active(&self, params: &VoiceParams) -> bool {
        params.volume != 1.0
    }

    fn process(&mut self, frame: AudioFrame, params: &VoiceParams) -> Result<AudioFrame> {
        let AudioFrame { source, samples, sequence } = frame;
        let samples = apply_volume(&samples.into_int(), params.volume);
        Ok(AudioFrame {
            source,
            samples: Samples::Int(samples),
            sequence,
        })
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SourceId;

    #[test]
    fn unity_volume_is_identity() {
        let input = vec![i16::MIN, -1, 0, 1, 12_345, i16::MAX];
        assert_eq!(apply_volume(&input, 1.0), input);
    }

    #[test]
    fn halves_and_truncates() {
        assert_eq!(apply_volume(&[1_001, -1_001, 3], 0.5), vec![500, -500, 1]);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        assert_eq!(apply_volume(&[20_000, -20_000], 2.0), vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn zero_volume_silences() {
        assert!(apply_volume(&[5, -5, 30_000], 0.0).iter().all(|&s| s == 0));
    }

    #[test]
    fn processor_active_only_off_unity() {
        let g = GainProcessor::new();
        assert!(!g.is_active(&VoiceParams::default()));
        assert!(g.is_active(&VoiceParams::default().with_volume(0.5)));
    }

    #[test]
    fn processor_outputs_int_samples() {
        let mut g = GainProcessor::new();
        let frame = AudioFrame {
            source: SourceId(3),
            samples: Samples::Int(vec![100, -100]),
            sequence: 9,
        };
        let out = g.process(frame, &VoiceParams::default().with_volume(2.0)).unwrap();
        assert_eq!(out.samples, Samples::Int(vec![200, -200]));
        assert_eq!(out.sequence, 9);
    }
}
