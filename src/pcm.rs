//! 16-bit little-endian PCM <-> normalized float conversion.
//!
//! Decoding divides by 32768 so that -32768 maps exactly to -1.0; encoding
//! clips to [-1, 1] and scales by 32767 so +1.0 never overflows. The two
//! scales differ on purpose, so a round trip is accurate to within
//! 1.5 quantization steps rather than bit-exact.

const DECODE_SCALE: f32 = 32_768.0;
const ENCODE_SCALE: f32 = 32_767.0;

/// Little-endian byte pairs to signed samples. A trailing odd byte is dropped.
pub fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Signed samples to little-endian bytes.
pub fn i16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let le: Vec<i16> = samples.iter().map(|s| s.to_le()).collect();
    bytemuck::cast_slice::<i16, u8>(&le).to_vec()
}

pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / DECODE_SCALE).collect()
}

pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            // NaN clamps to NaN and casts to 0
            let clipped = s.clamp(-1.0, 1.0);
            (clipped * ENCODE_SCALE).round() as i16
        })
        .collect()
}

/// Raw PCM bytes to normalized floats.
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / DECODE_SCALE)
        .collect()
}

/// Normalized floats to raw PCM bytes.
pub fn encode(samples: &[f32]) -> Vec<u8> {
    i16_to_bytes(&f32_to_i16(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dasp::{signal, Signal};

    #[test]
    fn decode_normalizes_extremes() {
        let bytes = i16_to_bytes(&[i16::MIN, 0, i16::MAX]);
        let out = decode(&bytes);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 32_767.0 / 32_768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn decode_drops_trailing_odd_byte() {
        let out = decode(&[0x00, 0x40, 0x7f]);
        assert_eq!(out, vec![0.5]);
        assert_eq!(bytes_to_i16(&[0x01]), Vec::<i16>::new());
    }

    #[test]
    fn bytes_are_little_endian() {
        assert_eq!(i16_to_bytes(&[0x1234, -2]), vec![0x34, 0x12, 0xfe, 0xff]);
        assert_eq!(bytes_to_i16(&[0x34, 0x12, 0xfe, 0xff]), vec![0x1234, -2]);
    }

    #[test]
    fn encode_clips_out_of_range_values() {
        assert_eq!(f32_to_i16(&[1.5, -7.0, 1.0, -1.0]), vec![32_767, -32_767, 32_767, -32_767]);
    }

    #[test]
    fn encode_rounds_to_nearest() {
        let half_step = 1.0 / ENCODE_SCALE;
        assert_eq!(f32_to_i16(&[half_step * 0.4, half_step * 0.6]), vec![0, 1]);
    }

    #[test]
    fn encode_decode_preserve_length() {
        let samples = vec![0.25_f32; 481];
        let bytes = encode(&samples);
        assert_eq!(bytes.len(), 962);
        assert_eq!(decode(&bytes).len(), 481);
    }

    #[test]
    fn round_trip_stays_within_quantization() {
        let tone: Vec<f32> = signal::rate(48_000.0)
            .const_hz(440.0)
            .sine()
            .take(4_800)
            .map(|s| s as f32)
            .chain([1.0, -1.0, 0.0, 0.5, -0.5])
            .collect();

        let back = i16_to_f32(&f32_to_i16(&tone));
        let tolerance = 1.5 / DECODE_SCALE + f32::EPSILON;
        for (a, b) in tone.iter().zip(back.iter()) {
            assert!((a - b).abs() <= tolerance, "{a} vs {b}");
        }
    }
}
