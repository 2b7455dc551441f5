//! WSOLA time stretching: changes duration without changing pitch.
//!
//! Grains of [`GRAIN_LEN`] samples are overlap-added at a fixed synthesis hop
//! of half a grain. Each grain is read from the input near its nominal
//! analysis position, shifted by up to [`SEARCH_RADIUS`] samples to best
//! continue the waveform of the previous grain.

use std::f32::consts::PI;

/// 10 ms at 48 kHz
pub const GRAIN_LEN: usize = 480;
pub const SYNTHESIS_HOP: usize = GRAIN_LEN / 2;
/// 2.5 ms at 48 kHz
pub const SEARCH_RADIUS: isize = 120;

fn hann_window(len: usize) -> Vec<f32> {
    // Periodic form, so 50% overlapped windows sum to exactly one
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / len as f32).cos())
        .collect()
}

#[inline]
fn sample_at(input: &[f32], index: isize) -> f32 {
    if index < 0 {
        0.0
    } else {
        input.get(index as usize).copied().unwrap_or(0.0)
    }
}

/// Offset of the candidate around `nominal` whose first `overlap` samples best
/// match the natural continuation at `target`.
fn best_offset(input: &[f32], nominal: isize, target: isize, overlap: usize) -> isize {
    let mut best = nominal;
    let mut best_score = f32::NEG_INFINITY;

    for delta in -SEARCH_RADIUS..=SEARCH_RADIUS {
        let candidate = nominal + delta;
        if candidate < 0 {
            continue;
        }
        let mut score = 0.0;
        for j in 0..overlap as isize {
            score += sample_at(input, candidate + j) * sample_at(input, target + j);
        }
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }

    best
}

/// Stretch `input` to `round(input.len() * factor)` samples.
/// `factor` above one lengthens the signal.
pub fn time_stretch(input: &[f32], factor: f32) -> Vec<f32> {
    let out_len = (input.len() as f32 * factor).round() as usize;
    if input.is_empty() || out_len == 0 {
        return Vec::new();
    }
    if (factor - 1.0).abs() < f32::EPSILON {
        return input.to_vec();
    }

    let window = hann_window(GRAIN_LEN);
    let hop = SYNTHESIS_HOP as isize;
    let overlap = GRAIN_LEN - SYNTHESIS_HOP;

    let mut out = vec![0.0_f32; out_len];
    let mut norm = vec![0.0_f32; out_len];
    let mut previous: Option<isize> = None;

    // Start one hop early so the first output sample is covered by two grains.
    let mut synth = -hop;
    while synth < out_len as isize {
        let nominal = (synth as f32 / factor).round() as isize;
        let read = match previous {
            Some(prev) => best_offset(input, nominal, prev + hop, overlap),
            None => nominal,
        };

        for (j, &w) in window.iter().enumerate() {
            let pos = synth + j as isize;
            if pos < 0 {
                continue;
            }
            let pos = pos as usize;
            if pos >= out_len {
                break;
            }
            out[pos] += sample_at(input, read + j as isize) * w;
            norm[pos] += w;
        }

        previous = Some(read);
        synth += hop;
    }

    for (sample, weight) in out.iter_mut().zip(norm.iter()) {
        if *weight > 1e-3 {
            *sample /= *weight;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dasp::{signal, Signal};

    fn tone(hz: f64, len: usize) -> Vec<f32> {
        signal::rate(48_000.0)
            .const_hz(hz)
            .sine()
            .take(len)
            .map(|s| s as f32 * 0.5)
            .collect()
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn window_overlap_adds_to_unity() {
        let w = hann_window(GRAIN_LEN);
        for i in 0..SYNTHESIS_HOP {
            assert!((w[i] + w[i + SYNTHESIS_HOP] - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn output_length_follows_factor() {
        let input = tone(300.0, 4_800);
        assert_eq!(time_stretch(&input, 1.5).len(), 7_200);
        assert_eq!(time_stretch(&input, 0.5).len(), 2_400);
        assert_eq!(time_stretch(&input, 1.0), input);
        assert!(time_stretch(&[], 2.0).is_empty());
    }

    #[test]
    fn stretching_keeps_frequency() {
        let input = tone(400.0, 9_600);
        let out = time_stretch(&input, 1.5);
        // 400 Hz has 800 crossings per second; compare per-sample density.
        let density_in = zero_crossings(&input) as f32 / input.len() as f32;
        let density_out = zero_crossings(&out) as f32 / out.len() as f32;
        assert!((density_out / density_in - 1.0).abs() < 0.1, "{density_in} vs {density_out}");
    }

    #[test]
    fn stretching_keeps_level_bounded() {
        let input = tone(250.0, 4_800);
        let out = time_stretch(&input, 0.7);
        assert!(out.iter().all(|s| s.abs() <= 0.5 + 1e-3));
    }
}
