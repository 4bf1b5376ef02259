//! PCM signal generators for tests and benchmarks.
//!
//! All generators produce interleaved little-endian signed 16-bit PCM, the
//! buffer shape the DSP functions operate on.

use rand::Rng;

/// Generates a mono sine wave.
///
/// `amplitude` is in raw sample units (0..=32767).
#[must_use]
pub fn sine_pcm(sample_rate: u32, freq_hz: f64, samples: usize, amplitude: f64) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples * 2);
    for n in 0..samples {
        let t = n as f64 / f64::from(sample_rate);
        let value = (amplitude * (2.0 * std::f64::consts::PI * freq_hz * t).sin()) as i16;
        pcm.extend_from_slice(&value.to_le_bytes());
    }
    pcm
}

/// Generates a buffer of digital silence.
#[must_use]
pub fn silence_pcm(samples: usize) -> Vec<u8> {
    vec![0u8; samples * 2]
}

/// Generates uniform white noise with the given peak amplitude.
#[must_use]
pub fn noise_pcm(samples: usize, amplitude: i16) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let mut pcm = Vec::with_capacity(samples * 2);
    for _ in 0..samples {
        let value: i16 = rng.gen_range(-amplitude..=amplitude);
        pcm.extend_from_slice(&value.to_le_bytes());
    }
    pcm
}

/// Generates a buffer where every sample holds the same value.
#[must_use]
pub fn constant_pcm(samples: usize, value: i16) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples * 2);
    for _ in 0..samples {
        pcm.extend_from_slice(&value.to_le_bytes());
    }
    pcm
}
