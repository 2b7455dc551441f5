//! Persistent Schroeder-style reverb: four parallel damped comb filters
//! followed by two series all-pass diffusers.
//!
//! Delay lines live across calls so the tail of one frame rings into the
//! next. One instance belongs to exactly one source and must see that
//! source's frames in capture order.

use tracing::debug;

use crate::config::VoiceParams;
use crate::error::Result;
use crate::messages::{AudioFrame, Samples};
use super::AudioProcessor;

/// Comb delay lengths at 48 kHz (~23-28 ms).
pub const COMB_DELAYS: [usize; 4] = [1116, 1188, 1277, 1356];
/// All-pass delay lengths at 48 kHz (~11 ms and ~9 ms).
pub const ALL_PASS_DELAYS: [usize; 2] = [556, 441];
/// One-pole low-pass coefficient inside each comb loop.
pub const DAMPING: f32 = 0.2;
const ALL_PASS_GAIN: f32 = 0.5;

/// `0.28` at room size 0 up to `1.0` (borderline unstable) at room size 1.
pub fn feedback_for_room_size(room_size: f32) -> f32 {
    0.28 + 0.72 * room_size
}

#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    filter_store: f32,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            index: 0,
            filter_store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32) -> f32 {
        let delayed = self.buffer[self.index];
        self.filter_store = delayed + (self.filter_store - delayed) * DAMPING;
        let y = self.filter_store;

        self.buffer[self.index] = input + y * feedback;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        y
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
        self.filter_store = 0.0;
    }
}

#[derive(Debug, Clone)]
struct AllPassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllPassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buf_out = self.buffer[self.index];
        self.buffer[self.index] = input + buf_out * ALL_PASS_GAIN;
        self.index += 1;
        if self.index == self.buffer.len() {
            self.index = 0;
        }
        buf_out - input * ALL_PASS_GAIN
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

/// Delay lines, cursors and filter accumulators of one source's reverb.
/// Buffer lengths are fixed at construction.
#[derive(Debug, Clone)]
pub struct ReverbState {
    combs: [CombFilter; 4],
    all_passes: [AllPassFilter; 2],
}

impl Default for ReverbState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverbState {
    pub fn new() -> Self {
        Self {
            combs: COMB_DELAYS.map(CombFilter::new),
            all_passes: ALL_PASS_DELAYS.map(AllPassFilter::new),
        }
    }

    /// Zero every buffer, cursor and accumulator.
    pub fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.all_passes.iter_mut().for_each(AllPassFilter::clear);
    }

    #[inline]
    fn tick(&mut self, sample: f32, feedback: f32, wet_mix: f32) -> f32 {
        let mut comb_sum = 0.0;
        for comb in &mut self.combs {
            comb_sum += comb.process(sample, feedback);
        }
        let mut rev = comb_sum * (1.0 / self.combs.len() as f32);

        for all_pass in &mut self.all_passes {
            rev = all_pass.process(rev);
        }

        sample * (1.0 - wet_mix) + rev * wet_mix
    }

    /// Process `samples` in place. `room_size` and `wet_mix` are expected in [0, 1].
    pub fn process_in_place(&mut self, samples: &mut [f32], room_size: f32, wet_mix: f32) {
        let feedback = feedback_for_room_size(room_size);
        for sample in samples.iter_mut() {
            *sample = self.tick(*sample, feedback, wet_mix);
        }
    }

    pub fn process(&mut self, input: &[f32], room_size: f32, wet_mix: f32) -> Vec<f32> {
        let mut out = input.to_vec();
        self.process_in_place(&mut out, room_size, wet_mix);
        out
    }

    #[cfg(test)]
    fn is_zeroed(&self) -> bool {
        self.combs
            .iter()
            .all(|c| c.index == 0 && c.filter_store == 0.0 && c.buffer.iter().all(|&s| s == 0.0))
            && self
                .all_passes
                .iter()
                .all(|a| a.index == 0 && a.buffer.iter().all(|&s| s == 0.0))
    }
}

/// Reverb stage. The state is allocated on the first reverb-enabled frame.
pub struct ReverbProcessor {
    state: Option<ReverbState>,
}

impl ReverbProcessor {
    pub fn new() -> Self {
        Self { state: None }
    }

    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }
}

impl Default for ReverbProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProcessor for ReverbProcessor {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn is_active(&self, params: &VoiceParams) -> bool {
        params.reverb_enabled
    }

    fn modifies(&self, params: &VoiceParams) -> bool {
        params.reverb_enabled && params.wet_mix > 0.0
    }

    fn process(&mut self, frame: AudioFrame, params: &VoiceParams) -> Result<AudioFrame> {
        let AudioFrame { source, samples, sequence } = frame;
        let mut samples = samples.into_float();

        let state = self.state.get_or_insert_with(ReverbState::new);
        let room_size = params.room_size.clamp(0.0, 1.0);
        let wet_mix = params.wet_mix.clamp(0.0, 1.0);
        state.process_in_place(&mut samples, room_size, wet_mix);

        Ok(AudioFrame {
            source,
            samples: Samples::Float(samples),
            sequence,
        })
    }

    fn reset(&mut self) {
        if let Some(state) = &mut self.state {
            debug!("reverb state zeroed");
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SourceId;
    use dasp::{signal, Signal};

    fn tone(len: usize) -> Vec<f32> {
        signal::rate(48_000.0)
            .const_hz(220.0)
            .sine()
            .take(len)
            .map(|s| s as f32 * 0.8)
            .collect()
    }

    fn impulse(len: usize) -> Vec<f32> {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        v
    }

    #[test]
    fn output_length_matches_input() {
        let mut r = ReverbState::new();
        assert_eq!(r.process(&tone(960), 0.7, 0.3).len(), 960);
        assert!(r.process(&[], 0.7, 0.3).is_empty());
    }

    #[test]
    fn tail_carries_across_frames() {
        let mut r = ReverbState::new();
        r.process(&impulse(960), 0.7, 1.0);
        let next = r.process(&vec![0.0; 960], 0.7, 1.0);
        assert!(next.iter().any(|&s| s.abs() > 1e-4));
    }

    #[test]
    fn first_comb_echo_arrives_after_shortest_delay() {
        let mut r = ReverbState::new();
        let out = r.process(&impulse(1_200), 0.5, 1.0);
        // Dry path is muted and no comb has wrapped yet.
        assert!(out[..COMB_DELAYS[0]].iter().all(|&s| s == 0.0));
        assert!(out[COMB_DELAYS[0]].abs() > 0.0);
    }

    #[test]
    fn reset_matches_fresh_engine() {
        let input = tone(2_400);
        let mut used = ReverbState::new();
        used.process(&tone(5_000), 0.9, 0.8);
        used.reset();
        assert!(used.is_zeroed());

        let mut fresh = ReverbState::new();
        let a = used.process(&input, 0.4, 0.6);
        let b = fresh.process(&input, 0.4, 0.6);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_wet_mix_passes_dry_signal() {
        let mut r = ReverbState::new();
        r.process(&tone(3_000), 1.0, 0.9);
        let input = tone(960);
        for room in [0.0, 0.5, 1.0] {
            assert_eq!(r.process(&input, room, 0.0), input);
        }
    }

    #[test]
    fn feedback_spans_documented_range() {
        assert!((feedback_for_room_size(0.0) - 0.28).abs() < 1e-6);
        assert!((feedback_for_room_size(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn comb_echo_decay_follows_feedback() {
        // Successive echoes of a unit impulse shrink by (1 - DAMPING) * feedback.
        let delay = COMB_DELAYS[0];
        for room in [0.0_f32, 1.0] {
            let feedback = feedback_for_room_size(room);
            let mut comb = CombFilter::new(delay);
            let out: Vec<f32> = impulse(3 * delay + 1)
                .into_iter()
                .map(|s| comb.process(s, feedback))
                .collect();

            assert!((out[delay] - (1.0 - DAMPING)).abs() < 1e-6);
            let ratio = out[2 * delay] / out[delay];
            assert!((ratio - (1.0 - DAMPING) * feedback).abs() < 1e-4, "room {room}: {ratio}");
            let ratio = out[3 * delay] / out[2 * delay];
            assert!((ratio - (1.0 - DAMPING) * feedback).abs() < 1e-4, "room {room}: {ratio}");
        }
    }

    #[test]
    fn processor_allocates_state_lazily_and_resets() {
        let mut p = ReverbProcessor::new();
        assert!(!p.has_state());
        p.reset();
        assert!(!p.has_state());

        let params = VoiceParams::default().with_reverb(0.7, 0.3);
        let frame = AudioFrame {
            source: SourceId(2),
            samples: Samples::Float(tone(480)),
            sequence: 0,
        };
        let first = p.process(frame.clone(), &params).unwrap();
        assert!(p.has_state());

        p.reset();
        let again = p.process(frame, &params).unwrap();
        assert_eq!(first.samples, again.samples);
    }

    #[test]
    fn zero_wet_is_active_but_unmodified() {
        let p = ReverbProcessor::new();
        let params = VoiceParams::default().with_reverb(0.7, 0.0);
        assert!(p.is_active(&params));
        assert!(!p.modifies(&params));
        assert!(!p.is_active(&VoiceParams::default()));
    }
}
