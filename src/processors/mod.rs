use crate::config::VoiceParams;
use crate::error::Result;
use crate::messages::AudioFrame;

// Sub-modules
pub mod gain;
pub mod stretch;
pub mod pitch;
pub mod reverb;

// Re-exports
pub use gain::GainProcessor;
pub use pitch::{PitchEngine, PitchProcessor, SpeedProcessor};
pub use reverb::{ReverbProcessor, ReverbState};

/// Trait for all per-source stages of the voice pipeline
pub trait AudioProcessor: Send {
    /// Stage label used for stats and logs
    fn name(&self) -> &'static str;

    /// Whether the stage must run for these (already clamped) parameters
    fn is_active(&self, params: &VoiceParams) -> bool;

    /// Whether running the stage with these parameters changes the audio.
    /// Active stages are identity transforms only at their boundaries,
    /// e.g. reverb with a zero wet mix.
    fn modifies(&self, params: &VoiceParams) -> bool {
        self.is_active(params)
    }

    /// Process a single frame. Only called when `is_active` is true.
    fn process(&mut self, frame: AudioFrame, params: &VoiceParams) -> Result<AudioFrame>;

    /// Drop all state carried between frames
    fn reset(&mut self);
}

/// Processor that passes frames through unchanged (for testing/debugging)
pub struct PassthroughProcessor;

impl AudioProcessor for PassthroughProcessor {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn is_active(&self, _params: &VoiceParams) -> bool {
        true
    }

    fn modifies(&self, _params: &VoiceParams) -> bool {
        false
    }

    fn process(&mut self, frame: AudioFrame, _params: &VoiceParams) -> Result<AudioFrame> {
        Ok(frame)
    }

    fn reset(&mut self) {}
}
