use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::{FailurePolicy, PipelineConfig, VoiceParams};
use crate::error::Result;
use crate::loudness::loudness;
use crate::messages::{AudioFrame, ProcessedFrame, Samples, SourceId};
use crate::pcm;
use crate::processors::{
    AudioProcessor, GainProcessor, PitchProcessor, ReverbProcessor, SpeedProcessor,
};
use crate::stats::RuntimeStatsHandle;

/// Per-source chain: decode -> gain -> speed -> pitch -> reverb -> encode,
/// with a loudness tap on the encoded output.
///
/// Holds the source's persistent reverb state, so frames must be fed in
/// capture order and never from two threads at once.
pub struct VoicePipeline {
    source: SourceId,
    config: PipelineConfig,
    processors: Vec<Box<dyn AudioProcessor>>,
    stats: RuntimeStatsHandle,
    next_sequence: u64,
}

impl VoicePipeline {
    pub fn new(source: SourceId, config: PipelineConfig, stats: RuntimeStatsHandle) -> Self {
        let processors: Vec<Box<dyn AudioProcessor>> = vec![
            Box::new(GainProcessor::new()),
            Box::new(SpeedProcessor::new(config.pitch_mode)),
            Box::new(PitchProcessor::new(config.pitch_mode)),
            Box::new(ReverbProcessor::new()),
        ];
        Self::with_processors(source, config, processors, stats)
    }

    /// Pipeline over a custom stage list, run in the given order.
    pub fn with_processors(
        source: SourceId,
        config: PipelineConfig,
        processors: Vec<Box<dyn AudioProcessor>>,
        stats: RuntimeStatsHandle,
    ) -> Self {
        Self {
            source,
            config,
            processors,
            stats,
            next_sequence: 0,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &RuntimeStatsHandle {
        &self.stats
    }

    /// Runs one frame of little-endian 16-bit PCM through every active stage.
    /// A pitch/speed failure fails the whole frame.
    pub fn process_frame(&mut self, bytes: &[u8], params: &VoiceParams) -> Result<ProcessedFrame> {
        let sequence = self.take_sequence();
        self.stats.update(|s| s.frames_in += 1);
        self.run(bytes, params, sequence)
    }

    /// Like [`process_frame`](Self::process_frame), but a pitch/speed failure is
    /// resolved with the configured [`FailurePolicy`]. `PassThrough` reruns the
    /// frame without the pitch/speed transform; `Drop` returns the error.
    pub fn process_frame_with_policy(
        &mut self,
        bytes: &[u8],
        params: &VoiceParams,
    ) -> Result<ProcessedFrame> {
        let sequence = self.take_sequence();
        self.stats.update(|s| s.frames_in += 1);
        match self.run(bytes, params, sequence) {
            Err(err) if err.is_pitch_failure() => match self.config.failure_policy {
                FailurePolicy::PassThrough => {
                    warn!(
                        source = %self.source,
                        sequence,
                        error = %err,
                        "pitch stage failed, passing frame through"
                    );
                    self.stats.update(|s| s.frames_passed_through += 1);
                    self.run(bytes, &params.without_pitch(), sequence)
                }
                FailurePolicy::Drop => {
                    warn!(
                        source = %self.source,
                        sequence,
                        error = %err,
                        "pitch stage failed, dropping frame"
                    );
                    self.stats.update(|s| s.frames_dropped += 1);
                    Err(err)
                }
            },
            other => other,
        }
    }

    /// Clears all cross-frame state. Call when the source's stream restarts
    /// discontinuously (mute, reconnect).
    pub fn reset(&mut self) {
        for processor in &mut self.processors {
            processor.reset();
        }
        self.stats.update(|s| s.resets += 1);
        debug!(source = %self.source, "pipeline reset");
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn run(&mut self, bytes: &[u8], params: &VoiceParams, sequence: u64) -> Result<ProcessedFrame> {
        let started = Instant::now();
        let params = params.clamped(self.config.pitch_mode);

        let mut frame = AudioFrame {
            source: self.source,
            samples: Samples::Int(pcm::bytes_to_i16(bytes)),
            sequence,
        };
        let mut modified = false;

        for processor in &mut self.processors {
            if !processor.is_active(&params) {
                continue;
            }

            let stage = processor.name();
            let stage_start = Instant::now();
            frame = match processor.process(frame, &params) {
                Ok(frame) => frame,
                Err(err) => {
                    if err.is_pitch_failure() {
                        self.stats.update(|s| s.pitch_failures += 1);
                    }
                    return Err(err);
                }
            };
            let elapsed = stage_start.elapsed().as_nanos() as u64;
            modified |= processor.modifies(&params);

            self.stats.update(|s| {
                if let Some(slot) = s.stage_mut(stage) {
                    slot.record(elapsed);
                }
            });
            trace!(source = %self.source, sequence, stage, elapsed_ns = elapsed, "stage done");
        }

        let frame_ns = frame.duration_ns();
        let bytes = pcm::i16_to_bytes(&frame.samples.into_int());
        let score = loudness(&bytes, modified);

        let total = started.elapsed().as_nanos() as u64;
        self.stats.update(|s| {
            s.frames_out += 1;
            s.total_frame.record(total);
        });
        trace!(source = %self.source, sequence, frame_ns, elapsed_ns = total, "frame done");

        Ok(ProcessedFrame {
            bytes,
            loudness: score,
            modified,
        })
    }
}
