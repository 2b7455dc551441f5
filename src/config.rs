use serde::{Deserialize, Serialize};

use crate::error::{DspError, Result};

/// How the `pitch` parameter of [`VoiceParams`] is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchMode {
    /// Duration-preserving shift in semitones, clamped to ±12.
    #[default]
    Semitones,
    /// Varispeed: `pitch` in -10..10 maps to a playback ratio of `2^(pitch/10)`.
    Linear,
}

/// What a caller does with a frame whose pitch/speed stage failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Emit the frame without the pitch/speed transform.
    #[default]
    PassThrough,
    /// Report the failure; the frame is not emitted.
    Drop,
}

/// Per-source effect parameters, snapshotted by the host for every frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceParams {
    pub volume: f32,
    pub pitch: f32,
    pub speed: f32,
    pub reverb_enabled: bool,
    pub room_size: f32, // 0.7 = medium hall
    pub wet_mix: f32,   // 0.3 = subtle
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 0.0,
            speed: 1.0,
            reverb_enabled: false,
            room_size: 0.7,
            wet_mix: 0.3,
        }
    }
}

pub const MIN_SEMITONES: f32 = -12.0;
pub const MAX_SEMITONES: f32 = 12.0;
pub const MIN_LINEAR_PITCH: f32 = -10.0;
pub const MAX_LINEAR_PITCH: f32 = 10.0;
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

pub(crate) fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl VoiceParams {
    /// Pulls every field into its documented domain. Never fails.
    pub fn clamped(&self, mode: PitchMode) -> Self {
        let (min_pitch, max_pitch) = match mode {
            PitchMode::Semitones => (MIN_SEMITONES, MAX_SEMITONES),
            PitchMode::Linear => (MIN_LINEAR_PITCH, MAX_LINEAR_PITCH),
        };

        Self {
            volume: finite_or(self.volume, 1.0).max(0.0),
            pitch: finite_or(self.pitch, 0.0).clamp(min_pitch, max_pitch),
            speed: finite_or(self.speed, 1.0).clamp(MIN_SPEED, MAX_SPEED),
            reverb_enabled: self.reverb_enabled,
            room_size: finite_or(self.room_size, 0.0).clamp(0.0, 1.0),
            wet_mix: finite_or(self.wet_mix, 0.0).clamp(0.0, 1.0),
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_reverb(mut self, room_size: f32, wet_mix: f32) -> Self {
        self.reverb_enabled = true;
        self.room_size = room_size;
        self.wet_mix = wet_mix;
        self
    }

    /// Same parameters with the pitch/speed transform disabled.
    pub fn without_pitch(mut self) -> Self {
        self.pitch = 0.0;
        self.speed = 1.0;
        self
    }
}

/// Settings fixed for the lifetime of a pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pitch_mode: PitchMode,
    pub failure_policy: FailurePolicy,
    pub queue_capacity: usize, // Pending frames per source worker
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pitch_mode: PitchMode::Semitones,
            failure_policy: FailurePolicy::PassThrough,
            queue_capacity: 64,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DspError::Config(e.to_string()))?;
        if config.queue_capacity == 0 {
            return Err(DspError::Config("queue_capacity must be at least 1".to_string()));
        }
        Ok(config)
    }
}
