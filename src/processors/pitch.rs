use std::collections::VecDeque;

use rubato::audioadapter::Adapter;
use rubato::{
    Async, FixedAsync, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use crate::config::{
    finite_or, PitchMode, VoiceParams, MAX_SEMITONES, MAX_SPEED, MIN_SEMITONES, MIN_SPEED,
};
use crate::error::{DspError, Result};
use crate::messages::{AudioFrame, Samples};
use super::stretch::time_stretch;
use super::AudioProcessor;

/// Feed/drain chunk, ~42 ms at 48 kHz mono
pub const CHUNK_SIZE: usize = 2048;
/// Window of the crossfade back into the original when output runs short
pub const CROSSFADE_SAMPLES: usize = 100;
/// Fade-out applied to the end of pitch-shifted output
pub const TAIL_FADE_SAMPLES: usize = 64;

const SINC_LEN: usize = 64;
const MAX_FLUSH_CHUNKS: usize = 16;

/// Speeds inside this band are treated as unity.
pub fn is_unity_speed(speed: f32) -> bool {
    (0.99..=1.01).contains(&speed)
}

/// Maps the legacy linear pitch parameter (-10..10) to a playback ratio.
pub fn linear_pitch_ratio(pitch: f32) -> f32 {
    let pitch = finite_or(pitch, 0.0).clamp(-10.0, 10.0);
    2.0_f32.powf(pitch / 10.0).clamp(0.5, 2.0)
}

pub fn semitone_ratio(semitones: f32) -> f32 {
    2.0_f32.powf(semitones / 12.0)
}

// Mono view over a sample slice for rubato
struct MonoBuffer<'a> {
    data: &'a [f32],
}

impl<'a> Adapter<'a, f32> for MonoBuffer<'a> {
    fn channels(&self) -> usize { 1 }
    fn frames(&self) -> usize { self.data.len() }
    fn read_sample(&self, channel: usize, frame: usize) -> Option<f32> {
        if channel == 0 { self.data.get(frame).copied() } else { None }
    }
    unsafe fn read_sample_unchecked(&self, _channel: usize, frame: usize) -> f32 {
        *self.data.get_unchecked(frame)
    }
}

/// Streaming pitch/speed engine for one utterance.
///
/// Input is resampled by `1 / pitch_ratio`, which scales both pitch and
/// duration, then time-stretched by `pitch_ratio / speed` to land on the
/// requested duration. Feed with [`feed`](Self::feed), end the input with
/// [`flush`](Self::flush), then [`drain`](Self::drain) until it returns 0.
pub struct PitchEngine {
    resampler: Option<Async<f32>>,
    resample_ratio: f64,
    stretch_factor: f32,
    pending: Vec<f32>,
    resampled: Vec<f32>,
    input_len: usize,
    output: VecDeque<f32>,
    flushed: bool,
}

impl PitchEngine {
    pub fn new(speed: f32, pitch_ratio: f32) -> Result<Self> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(DspError::PitchEngineInit(format!("invalid speed {}", speed)));
        }
        if !pitch_ratio.is_finite() || pitch_ratio <= 0.0 {
            return Err(DspError::PitchEngineInit(format!("invalid pitch ratio {}", pitch_ratio)));
        }

        let resample_ratio = 1.0 / pitch_ratio as f64;
        let resampler = if (pitch_ratio - 1.0).abs() > f32::EPSILON {
            let params = SincInterpolationParameters {
                sinc_len: SINC_LEN,
                f_cutoff: 0.915,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: WindowFunction::BlackmanHarris2,
            };
            let resampler = Async::<f32>::new_sinc(
                resample_ratio,
                1.1,
                &params,
                CHUNK_SIZE,
                1,
                FixedAsync::Input,
            )
            .map_err(|e| DspError::PitchEngineInit(e.to_string()))?;
            Some(resampler)
        } else {
            None
        };

        Ok(Self {
            resampler,
            resample_ratio,
            stretch_factor: pitch_ratio / speed,
            pending: Vec::with_capacity(CHUNK_SIZE * 2),
            resampled: Vec::new(),
            input_len: 0,
            output: VecDeque::new(),
            flushed: false,
        })
    }

    pub fn feed(&mut self, samples: &[f32]) -> Result<()> {
        if self.flushed {
            return Err(DspError::PitchEngineProcess("feed after flush".to_string()));
        }
        self.input_len += samples.len();

        if self.resampler.is_none() {
            self.resampled.extend_from_slice(samples);
            return Ok(());
        }

        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.next_input_len() {
            self.resample_pending_chunk()?;
        }
        Ok(())
    }

    /// Ends the input. Later calls are no-ops.
    pub fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let delay = self.resampler.as_ref().map(|r| r.output_delay());
        let resampled = match delay {
            Some(delay) if self.input_len > 0 => {
                let expected = (self.input_len as f64 * self.resample_ratio).round() as usize;

                // Zero-pad until the delayed tail of the real input is out
                let mut chunks = 0;
                while self.resampled.len() < delay + expected {
                    if chunks == MAX_FLUSH_CHUNKS {
                        return Err(DspError::PitchEngineProcess(
                            "resampler did not drain after flush".to_string(),
                        ));
                    }
                    let needed = self.next_input_len();
                    self.pending.resize(needed.max(self.pending.len()), 0.0);
                    self.resample_pending_chunk()?;
                    chunks += 1;
                }

                self.resampled[delay..delay + expected].to_vec()
            }
            Some(_) => Vec::new(),
            None => std::mem::take(&mut self.resampled),
        };
        self.pending.clear();
        self.resampled.clear();

        self.output.extend(time_stretch(&resampled, self.stretch_factor));
        Ok(())
    }

    /// Copies up to `out.len()` ready samples into `out`. Returns 0 once empty.
    pub fn drain(&mut self, out: &mut [f32]) -> usize {
        let count = out.len().min(self.output.len());
        for (slot, sample) in out.iter_mut().zip(self.output.drain(..count)) {
            *slot = sample;
        }
        count
    }

    pub fn samples_available(&self) -> usize {
        self.output.len()
    }

    fn next_input_len(&self) -> usize {
        self.resampler
            .as_ref()
            .map(|r| r.input_frames_next())
            .unwrap_or(CHUNK_SIZE)
    }

    fn resample_pending_chunk(&mut self) -> Result<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(());
        };

        let needed = resampler.input_frames_next();
        let input = MonoBuffer { data: &self.pending[..needed] };
        let output = resampler
            .process(&input, 0, None)
            .map_err(|e| DspError::PitchEngineProcess(e.to_string()))?;

        for i in 0..output.frames() {
            match output.read_sample(0, i) {
                Some(sample) => self.resampled.push(sample),
                None => break,
            }
        }
        self.pending.drain(..needed);
        Ok(())
    }
}

/// Feeds `samples` through a fresh engine in fixed chunks and drains all output.
/// The engine lives only for this call.
fn run_engine(samples: &[f32], speed: f32, pitch_ratio: f32) -> Result<Vec<f32>> {
    let mut engine = PitchEngine::new(speed, pitch_ratio)?;
    for chunk in samples.chunks(CHUNK_SIZE) {
        engine.feed(chunk)?;
    }
    engine.flush()?;

    let mut out = Vec::with_capacity(samples.len() * 2);
    let mut buf = vec![0.0_f32; CHUNK_SIZE];
    loop {
        let got = engine.drain(&mut buf);
        if got == 0 {
            break;
        }
        out.extend_from_slice(&buf[..got]);
    }
    Ok(out)
}

/// Sizes `processed` to `original.len()`. Longer output is truncated; shorter
/// output is linearly crossfaded into the original over the last
/// [`CROSSFADE_SAMPLES`] produced samples, and the original fills the rest.
pub fn fit_to_length(processed: &[f32], original: &[f32]) -> Vec<f32> {
    let len = original.len();
    let read = processed.len().min(len);
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(&processed[..read]);

    if read < len {
        let fade_start = read.saturating_sub(CROSSFADE_SAMPLES);
        for i in fade_start..read {
            let fade_out = (read - i) as f32 / CROSSFADE_SAMPLES as f32;
            let fade_in = 1.0 - fade_out;
            out[i] = out[i] * fade_out + original[i] * fade_in;
        }
        out.extend_from_slice(&original[read..]);
    }

    out
}

/// Linear fade-out over the last [`TAIL_FADE_SAMPLES`] (or fewer) samples.
pub fn apply_tail_fade(samples: &mut [f32]) {
    let fade = TAIL_FADE_SAMPLES.min(samples.len());
    let start = samples.len() - fade;
    for (i, sample) in samples[start..].iter_mut().enumerate() {
        *sample *= (fade - i) as f32 / fade as f32;
    }
}

/// Varispeed: changes speed and pitch together. Output has the input's length.
/// A non-finite speed is treated as unity.
pub fn set_speed(samples: &[f32], speed: f32) -> Result<Vec<f32>> {
    let speed = finite_or(speed, 1.0);
    if is_unity_speed(speed) {
        return Ok(samples.to_vec());
    }
    let speed = speed.clamp(MIN_SPEED, MAX_SPEED);
    let processed = run_engine(samples, speed, speed)?;
    Ok(fit_to_length(&processed, samples))
}

/// Duration-preserving pitch shift by `semitones` (clamped to ±12, non-finite
/// treated as 0).
pub fn pitch_shift(samples: &[f32], semitones: f32) -> Result<Vec<f32>> {
    let semitones = finite_or(semitones, 0.0).clamp(MIN_SEMITONES, MAX_SEMITONES);
    if semitones.abs() < 0.01 {
        return Ok(samples.to_vec());
    }
    let processed = run_engine(samples, 1.0, semitone_ratio(semitones))?;
    let mut out = fit_to_length(&processed, samples);
    apply_tail_fade(&mut out);
    Ok(out)
}

/// Speed stage. In [`PitchMode::Linear`] the pitch parameter also feeds the
/// playback ratio.
pub struct SpeedProcessor {
    mode: PitchMode,
}

impl SpeedProcessor {
    pub fn new(mode: PitchMode) -> Self {
        Self { mode }
    }

    pub fn effective_speed(&self, params: &VoiceParams) -> f32 {
        let speed = match self.mode {
            PitchMode::Semitones => params.speed,
            PitchMode::Linear => params.speed * linear_pitch_ratio(params.pitch),
        };
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

impl AudioProcessor for SpeedProcessor {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn is_active(&self, params: &VoiceParams) -> bool {
        !is_unity_speed(self.effective_speed(params))
    }

    fn process(&mut self, frame: AudioFrame, params: &VoiceParams) -> Result<AudioFrame> {
        let AudioFrame { source, samples, sequence } = frame;
        let samples = set_speed(&samples.into_float(), self.effective_speed(params))?;
        Ok(AudioFrame {
            source,
            samples: Samples::Float(samples),
            sequence,
        })
    }

    fn reset(&mut self) {}
}

/// Semitone pitch stage. Inactive in [`PitchMode::Linear`].
pub struct PitchProcessor {
    mode: PitchMode,
}

impl PitchProcessor {
    pub fn new(mode: PitchMode) -> Self {
        Self { mode }
    }
}

impl AudioProcessor for PitchProcessor {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn is_active(&self, params: &VoiceParams) -> bool {
        self.mode == PitchMode::Semitones && params.pitch.abs() >= 0.01
    }

    fn process(&mut self, frame: AudioFrame, params: &VoiceParams) -> Result<AudioFrame> {
        let AudioFrame { source, samples, sequence } = frame;
        let samples = pitch_shift(&samples.into_float(), params.pitch)?;
        Ok(AudioFrame {
            source,
            samples: Samples::Float(samples),
            sequence,
        })
    }

    fn reset(&mut self) {}
}
