//! PCM format conversion behind an injectable seam.
//!
//! The optimizer only needs "resample PCM from format A to format B"; the
//! concrete implementation wraps rubato's FFT fixed-input resampler. Tests
//! mock the trait to exercise failure paths without touching DSP.

use rubato::{FftFixedIn, Resampler};

use crate::errors::VoxflowError;

/// Full-scale reference for 16-bit samples.
const FULL_SCALE: f32 = 32_768.0;

/// Fixed input chunk size fed to the resampler.
const RESAMPLE_CHUNK: usize = 1024;

/// Shape of an interleaved 16-bit PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 or 2).
    pub channels: u16,
}

impl PcmFormat {
    /// Creates a new format descriptor.
    #[must_use]
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz / {} ch", self.sample_rate, self.channels)
    }
}

/// Converts interleaved 16-bit PCM between formats.
#[cfg_attr(test, mockall::automock)]
pub trait PcmConverter: Send + Sync {
    /// Converts `pcm` from `from` to `to`.
    ///
    /// Malformed input (odd length, incomplete frames) is truncated to
    /// complete frames rather than rejected.
    fn convert(&self, pcm: &[u8], from: PcmFormat, to: PcmFormat)
        -> Result<Vec<u8>, VoxflowError>;
}

/// [`PcmConverter`] backed by rubato's polyphase FFT resampler.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubatoConverter;

impl RubatoConverter {
    /// Creates a new converter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PcmConverter for RubatoConverter {
    fn convert(
        &self,
        pcm: &[u8],
        from: PcmFormat,
        to: PcmFormat,
    ) -> Result<Vec<u8>, VoxflowError> {
        validate(from)?;
        validate(to)?;

        if from == to {
            return Ok(pcm.to_vec());
        }

        let channels = decode_channels(pcm, from.channels);
        let mixed = remix(channels, to.channels);

        let resampled = if from.sample_rate == to.sample_rate {
            mixed
        } else {
            resample(mixed, from.sample_rate, to.sample_rate, to.channels)?
        };

        Ok(encode_interleaved(&resampled))
    }
}

fn validate(format: PcmFormat) -> Result<(), VoxflowError> {
    if format.sample_rate == 0 || !(1..=2).contains(&format.channels) {
        return Err(VoxflowError::UnsupportedFormat(format.to_string()));
    }
    Ok(())
}

/// Splits interleaved bytes into per-channel f32 waves scaled to [-1, 1].
fn decode_channels(pcm: &[u8], channels: u16) -> Vec<Vec<f32>> {
    let channels = usize::from(channels);
    let frame_bytes = channels * 2;
    let frames = pcm.len() / frame_bytes;

    let mut waves = vec![Vec::with_capacity(frames); channels];
    for frame in pcm.chunks_exact(frame_bytes) {
        for (ch, wave) in waves.iter_mut().enumerate() {
            let sample = i16::from_le_bytes([frame[ch * 2], frame[ch * 2 + 1]]);
            wave.push(f32::from(sample) / FULL_SCALE);
        }
    }
    waves
}

/// Mono to stereo duplicates; stereo to mono averages.
fn remix(mut waves: Vec<Vec<f32>>, target_channels: u16) -> Vec<Vec<f32>> {
    match (waves.len(), target_channels) {
        (1, 2) => {
            let mono = waves.remove(0);
            vec![mono.clone(), mono]
        }
        (2, 1) => {
            let right = waves.pop().unwrap_or_default();
            let left = waves.remove(0);
            vec![left
                .iter()
                .zip(right.iter())
                .map(|(l, r)| (l + r) * 0.5)
                .collect()]
        }
        _ => waves,
    }
}

/// Runs the per-channel waves through rubato in fixed chunks, finishing
/// with a partial chunk for the tail.
fn resample(
    waves: Vec<Vec<f32>>,
    from_rate: u32,
    to_rate: u32,
    channels: u16,
) -> Result<Vec<Vec<f32>>, VoxflowError> {
    let channels = usize::from(channels);
    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        RESAMPLE_CHUNK,
        2,
        channels,
    )
    .map_err(|e| VoxflowError::FormatConversion(e.to_string()))?;

    let total_frames = waves.first().map_or(0, Vec::len);
    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut position = 0;

    loop {
        let needed = resampler.input_frames_next();
        if total_frames - position < needed {
            break;
        }
        let chunk: Vec<&[f32]> = waves
            .iter()
            .map(|wave| &wave[position..position + needed])
            .collect();
        let processed = resampler
            .process(&chunk, None)
            .map_err(|e| VoxflowError::FormatConversion(e.to_string()))?;
        for (out, channel) in output.iter_mut().zip(processed) {
            out.extend(channel);
        }
        position += needed;
    }

    if position < total_frames {
        let tail: Vec<&[f32]> = waves.iter().map(|wave| &wave[position..]).collect();
        let processed = resampler
            .process_partial(Some(&tail), None)
            .map_err(|e| VoxflowError::FormatConversion(e.to_string()))?;
        for (out, channel) in output.iter_mut().zip(processed) {
            out.extend(channel);
        }
    }

    Ok(output)
}

/// Interleaves per-channel waves back into little-endian 16-bit bytes.
fn encode_interleaved(waves: &[Vec<f32>]) -> Vec<u8> {
    let frames = waves.first().map_or(0, Vec::len);
    let mut pcm = Vec::with_capacity(frames * waves.len() * 2);
    for frame in 0..frames {
        for wave in waves {
            let scaled = (wave[frame] * FULL_SCALE).clamp(f32::from(i16::MIN), f32::from(i16::MAX));
            pcm.extend_from_slice(&(scaled as i16).to_le_bytes());
        }
    }
    pcm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sine_pcm;

    #[test]
    fn test_same_format_passthrough() {
        let pcm = sine_pcm(16_000, 440.0, 160, 8_000.0);
        let converter = RubatoConverter::new();
        let format = PcmFormat::new(16_000, 1);

        let out = converter
            .convert(&pcm, format, format)
            .expect("passthrough should succeed");
        assert_eq!(out, pcm);
    }

    #[test]
    fn test_rejects_zero_rate() {
        let converter = RubatoConverter::new();
        let result = converter.convert(&[], PcmFormat::new(0, 1), PcmFormat::new(16_000, 1));
        assert!(matches!(result, Err(VoxflowError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_rejects_surround() {
        let converter = RubatoConverter::new();
        let result = converter.convert(&[], PcmFormat::new(48_000, 6), PcmFormat::new(16_000, 1));
        assert!(matches!(result, Err(VoxflowError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let pcm = sine_pcm(16_000, 440.0, 64, 8_000.0);
        let converter = RubatoConverter::new();

        let out = converter
            .convert(
                &pcm,
                PcmFormat::new(16_000, 1),
                PcmFormat::new(16_000, 2),
            )
            .expect("upmix should succeed");

        assert_eq!(out.len(), pcm.len() * 2);
        for (frame, src) in out.chunks_exact(4).zip(pcm.chunks_exact(2)) {
            assert_eq!(&frame[0..2], src);
            assert_eq!(&frame[2..4], src);
        }
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        // L = 1000, R = 3000 per frame
        let mut pcm = Vec::new();
        for _ in 0..32 {
            pcm.extend_from_slice(&1000i16.to_le_bytes());
            pcm.extend_from_slice(&3000i16.to_le_bytes());
        }
        let converter = RubatoConverter::new();

        let out = converter
            .convert(
                &pcm,
                PcmFormat::new(16_000, 2),
                PcmFormat::new(16_000, 1),
            )
            .expect("downmix should succeed");

        for chunk in out.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            assert!((sample - 2000).abs() <= 1);
        }
    }

    #[test]
    fn test_downsample_halves_frame_count() {
        let pcm = sine_pcm(48_000, 440.0, 4800, 8_000.0);
        let converter = RubatoConverter::new();

        let out = converter
            .convert(
                &pcm,
                PcmFormat::new(48_000, 1),
                PcmFormat::new(24_000, 1),
            )
            .expect("resample should succeed");

        let in_frames = pcm.len() / 2;
        let out_frames = out.len() / 2;
        // FFT chunking pads the tail and carries latency, so the count is
        // near half the input rather than exact
        assert!(out_frames > in_frames / 4);
        assert!(out_frames <= in_frames / 2 + RESAMPLE_CHUNK);
    }

    #[test]
    fn test_truncates_incomplete_frames() {
        let converter = RubatoConverter::new();
        let out = converter
            .convert(
                &[0x01, 0x02, 0x03],
                PcmFormat::new(16_000, 2),
                PcmFormat::new(16_000, 1),
            )
            .expect("truncation should succeed");
        assert!(out.is_empty());
    }
}
