use std::fmt;

use crate::pcm;

/// Fixed sample rate of every frame handled by the core.
pub const SAMPLE_RATE: u32 = 48_000;

/// Opaque identity of a voice source, assigned by the host's source registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// Sample payload of a frame. Stages convert lazily to the domain they need.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i16>),
    Float(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(s) => s.len(),
            Samples::Float(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_int(self) -> Vec<i16> {
        match self {
            Samples::Int(s) => s,
            Samples::Float(s) => pcm::f32_to_i16(&s),
        }
    }

    pub fn into_float(self) -> Vec<f32> {
        match self {
            Samples::Int(s) => pcm::i16_to_f32(&s),
            Samples::Float(s) => s,
        }
    }
}

/// Mono 48 kHz frame flowing through the pipeline
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub source: SourceId,
    pub samples: Samples,
    pub sequence: u64, // Capture order within the source
}

impl AudioFrame {
    /// Duration of the frame in nanoseconds at [`SAMPLE_RATE`].
    pub fn duration_ns(&self) -> u64 {
        self.samples.len() as u64 * 1_000_000_000 / SAMPLE_RATE as u64
    }
}

/// Encoded output of one pipeline pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    pub bytes: Vec<u8>,
    pub loudness: f64,
    pub modified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_frame_clone_preserves_fields() {
        let f = AudioFrame {
            source: SourceId(7),
            samples: Samples::Float(vec![0.1, -0.2]),
            sequence: 123,
        };
        let c = f.clone();
        assert_eq!(c.source, SourceId(7));
        assert_eq!(c.samples, Samples::Float(vec![0.1, -0.2]));
        assert_eq!(c.sequence, 123);
    }

    #[test]
    fn samples_convert_between_domains() {
        let ints = Samples::Int(vec![0, 16_384, -32_768]);
        let floats = ints.into_float();
        assert_eq!(floats, vec![0.0, 0.5, -1.0]);

        let back = Samples::Float(floats).into_int();
        assert_eq!(back, vec![0, 16_384, -32_767]);
    }

    #[test]
    fn twenty_ms_frame_duration() {
        let f = AudioFrame {
            source: SourceId(1),
            samples: Samples::Int(vec![0; 960]),
            sequence: 0,
        };
        assert_eq!(f.duration_ns(), 20_000_000);
        assert_eq!(f.source.to_string(), "source#1");
    }
}
