//! RMS loudness score for metering.
//!
//! Raw audio scores in [0, 100]. Effect-processed audio is remapped into the
//! disjoint band [101, 1000] so consumers can tell the two apart from the
//! number alone.

pub const RAW_MAX: f64 = 100.0;
pub const MODIFIED_MIN: f64 = 101.0;
pub const MODIFIED_MAX: f64 = 1000.0;
const MODIFIED_SCALE: f64 = 8.99;

/// Loudness of little-endian 16-bit PCM. Inputs shorter than one sample score 0.
pub fn loudness(bytes: &[u8], modified: bool) -> f64 {
    if bytes.len() < 2 {
        return 0.0;
    }

    let mut sum_squares = 0.0_f64;
    let mut count = 0_usize;
    for pair in bytes.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64 / 32_768.0;
        sum_squares += sample * sample;
        count += 1;
    }

    let rms = (sum_squares / count as f64).sqrt();
    let base = (rms * 100.0).clamp(0.0, RAW_MAX);

    if modified {
        (MODIFIED_MIN + base * MODIFIED_SCALE).clamp(MODIFIED_MIN, MODIFIED_MAX)
    } else {
        base
    }
}

/// Maps any score back onto the raw [0, 100] scale.
pub fn normalize_score(score: f64) -> f64 {
    if score >= MODIFIED_MIN {
        ((score - MODIFIED_MIN) / MODIFIED_SCALE).clamp(0.0, RAW_MAX)
    } else {
        score.clamp(0.0, RAW_MAX)
    }
}
