//! Voice effect core for 48 kHz mono 16-bit PCM.
//!
//! Each voice source owns a [`VoicePipeline`] (or a [`SourceWorker`] wrapping
//! one) that applies gain, optional pitch/speed shifting and a persistent
//! reverb, then reports a loudness score for metering.

pub mod messages;
pub mod config;
pub mod error;
pub mod pcm;
pub mod loudness;
pub mod processors;
pub mod pipeline;
pub mod stats;
pub mod worker;

pub use config::{FailurePolicy, PipelineConfig, PitchMode, VoiceParams};
pub use error::{DspError, Result};
pub use loudness::loudness;
pub use messages::{AudioFrame, ProcessedFrame, Samples, SourceId, SAMPLE_RATE};
pub use pipeline::VoicePipeline;
pub use processors::gain::apply_volume;
pub use processors::pitch::{linear_pitch_ratio, pitch_shift, set_speed};
pub use processors::ReverbState;
pub use stats::{RuntimeStats, RuntimeStatsHandle};
pub use worker::{FrameResult, SourceWorker, WorkerCommand};
