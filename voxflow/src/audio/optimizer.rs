//! Adaptive selection of encoding parameters from network telemetry.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::convert::{PcmConverter, PcmFormat, RubatoConverter};
use crate::audio::settings::{AudioQualitySettings, QualityPreset};
use crate::observability::SpanTimer;

/// Telemetry sample from the network-quality monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkConditions {
    /// Estimated available bandwidth in kbit/s.
    pub bandwidth_kbps: f64,
    /// Packet loss over the measurement window, 0-100.
    pub packet_loss_pct: u8,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
}

impl NetworkConditions {
    /// Creates a new telemetry sample.
    #[must_use]
    pub const fn new(bandwidth_kbps: f64, packet_loss_pct: u8, latency_ms: u64) -> Self {
        Self {
            bandwidth_kbps,
            packet_loss_pct,
            latency_ms,
        }
    }
}

/// Translates network conditions into encoder settings and hosts the
/// buffer-level conversion seam.
///
/// The current settings live behind one coarse lock; callers that hold the
/// optimizer observe each [`optimize_for_network`](Self::optimize_for_network)
/// update through [`current_settings`](Self::current_settings).
pub struct AudioQualityOptimizer {
    settings: Mutex<AudioQualitySettings>,
    converter: Arc<dyn PcmConverter>,
}

impl Default for AudioQualityOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioQualityOptimizer {
    /// Creates an optimizer with the default preset and rubato-backed
    /// converter.
    #[must_use]
    pub fn new() -> Self {
        Self::with_converter(Arc::new(RubatoConverter::new()))
    }

    /// Creates an optimizer with a caller-supplied conversion primitive.
    #[must_use]
    pub fn with_converter(converter: Arc<dyn PcmConverter>) -> Self {
        Self {
            settings: Mutex::new(AudioQualitySettings::default()),
            converter,
        }
    }

    /// Returns a snapshot of the current settings.
    #[must_use]
    pub fn current_settings(&self) -> AudioQualitySettings {
        self.settings.lock().clone()
    }

    /// Resets the current settings to a preset.
    pub fn apply_preset(&self, preset: QualityPreset) {
        let mut settings = self.settings.lock();
        *settings = AudioQualitySettings::from_preset(preset);
        debug!(?preset, "applied quality preset");
    }

    /// Replaces the current settings wholesale (the `Custom` preset path).
    pub fn apply_custom(&self, custom: AudioQualitySettings) {
        *self.settings.lock() = custom;
    }

    /// Re-derives encoder settings from a telemetry sample.
    ///
    /// The decision table runs in order and later steps only tighten what
    /// earlier steps chose:
    ///
    /// 1. Bandwidth tier picks base sample rate, bitrate, and channels.
    /// 2. Packet loss sets concealment aggressiveness; above 10% it also
    ///    caps the sample rate at 16 kHz.
    /// 3. Latency above 200 ms forces echo cancellation and noise
    ///    suppression on.
    /// 4. AGC is always on; bit depth is always 16.
    pub fn optimize_for_network(&self, conditions: NetworkConditions) -> AudioQualitySettings {
        let mut settings = self.settings.lock();

        let (sample_rate, bitrate, channels) = if conditions.bandwidth_kbps >= 512.0 {
            (48_000, 128_000, 2)
        } else if conditions.bandwidth_kbps >= 256.0 {
            (24_000, 64_000, 2)
        } else if conditions.bandwidth_kbps >= 128.0 {
            (16_000, 32_000, 1)
        } else {
            (8_000, 16_000, 1)
        };
        settings.sample_rate = sample_rate;
        settings.bitrate = bitrate;
        settings.channels = channels;

        if conditions.packet_loss_pct > 10 {
            settings.plc_aggressiveness = 8;
            settings.sample_rate = settings.sample_rate.min(16_000);
        } else if conditions.packet_loss_pct > 5 {
            settings.plc_aggressiveness = 5;
        } else {
            settings.plc_aggressiveness = 2;
        }

        if conditions.latency_ms > 200 {
            settings.echo_cancellation = true;
            settings.noise_suppression = true;
        }

        settings.automatic_gain_control = true;
        settings.bit_depth = 16;

        debug!(
            bandwidth_kbps = conditions.bandwidth_kbps,
            packet_loss_pct = conditions.packet_loss_pct,
            latency_ms = conditions.latency_ms,
            sample_rate = settings.sample_rate,
            bitrate = settings.bitrate,
            "optimized settings for network conditions"
        );

        settings.clone()
    }

    /// Converts a PCM buffer between formats.
    ///
    /// Conversion failures are logged and reported as `None`; they never
    /// propagate into the audio pipeline.
    #[must_use]
    pub fn convert_format(&self, pcm: &[u8], from: PcmFormat, to: PcmFormat) -> Option<Vec<u8>> {
        let timer = SpanTimer::start("convert_format");
        match self.converter.convert(pcm, from, to) {
            Ok(converted) => {
                tracing::trace!(
                    from = %from,
                    to = %to,
                    duration_ms = timer.finish(),
                    "converted PCM buffer"
                );
                Some(converted)
            }
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "format conversion failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for AudioQualityOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioQualityOptimizer")
            .field("settings", &self.current_settings())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::convert::MockPcmConverter;
    use crate::errors::VoxflowError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_high_bandwidth_low_loss() {
        let optimizer = AudioQualityOptimizer::new();
        let settings = optimizer.optimize_for_network(NetworkConditions::new(600.0, 2, 50));

        assert_eq!(settings.sample_rate, 48_000);
        assert_eq!(settings.bitrate, 128_000);
        assert_eq!(settings.channels, 2);
        assert_eq!(settings.plc_aggressiveness, 2);
    }

    #[test]
    fn test_low_bandwidth_heavy_loss() {
        let optimizer = AudioQualityOptimizer::new();
        let settings = optimizer.optimize_for_network(NetworkConditions::new(100.0, 15, 50));

        assert!(settings.sample_rate <= 16_000);
        assert_eq!(settings.plc_aggressiveness, 8);
        assert_eq!(settings.channels, 1);
    }

    #[test]
    fn test_loss_caps_high_bandwidth_rate() {
        let optimizer = AudioQualityOptimizer::new();
        let settings = optimizer.optimize_for_network(NetworkConditions::new(800.0, 20, 50));

        // Bandwidth chose 48 kHz, loss tightens it down
        assert_eq!(settings.sample_rate, 16_000);
        assert_eq!(settings.bitrate, 128_000);
        assert_eq!(settings.plc_aggressiveness, 8);
    }

    #[test]
    fn test_loss_boundaries() {
        let optimizer = AudioQualityOptimizer::new();

        let at_five = optimizer.optimize_for_network(NetworkConditions::new(300.0, 5, 50));
        assert_eq!(at_five.plc_aggressiveness, 2);

        let at_six = optimizer.optimize_for_network(NetworkConditions::new(300.0, 6, 50));
        assert_eq!(at_six.plc_aggressiveness, 5);

        let at_ten = optimizer.optimize_for_network(NetworkConditions::new(300.0, 10, 50));
        assert_eq!(at_ten.plc_aggressiveness, 5);
        assert_eq!(at_ten.sample_rate, 24_000);

        let at_eleven = optimizer.optimize_for_network(NetworkConditions::new(300.0, 11, 50));
        assert_eq!(at_eleven.plc_aggressiveness, 8);
        assert_eq!(at_eleven.sample_rate, 16_000);
    }

    #[test]
    fn test_bandwidth_tiers() {
        let optimizer = AudioQualityOptimizer::new();

        let tiers = [
            (512.0, 48_000, 128_000, 2),
            (256.0, 24_000, 64_000, 2),
            (128.0, 16_000, 32_000, 1),
            (64.0, 8_000, 16_000, 1),
        ];
        for (bandwidth, rate, bitrate, channels) in tiers {
            let settings =
                optimizer.optimize_for_network(NetworkConditions::new(bandwidth, 0, 20));
            assert_eq!(settings.sample_rate, rate, "bandwidth {bandwidth}");
            assert_eq!(settings.bitrate, bitrate, "bandwidth {bandwidth}");
            assert_eq!(settings.channels, channels, "bandwidth {bandwidth}");
        }
    }

    #[test]
    fn test_latency_forces_dsp_toggles() {
        let optimizer = AudioQualityOptimizer::new();
        let mut custom = optimizer.current_settings();
        custom.echo_cancellation = false;
        custom.noise_suppression = false;
        optimizer.apply_custom(custom);

        // Below the latency threshold the toggles are left alone
        let settings = optimizer.optimize_for_network(NetworkConditions::new(600.0, 1, 100));
        assert!(!settings.echo_cancellation);
        assert!(!settings.noise_suppression);

        let settings = optimizer.optimize_for_network(NetworkConditions::new(600.0, 1, 250));
        assert!(settings.echo_cancellation);
        assert!(settings.noise_suppression);
    }

    #[test]
    fn test_agc_and_bit_depth_always_forced() {
        let optimizer = AudioQualityOptimizer::new();
        let mut custom = optimizer.current_settings();
        custom.automatic_gain_control = false;
        custom.bit_depth = 24;
        optimizer.apply_custom(custom);

        let settings = optimizer.optimize_for_network(NetworkConditions::new(50.0, 0, 10));
        assert!(settings.automatic_gain_control);
        assert_eq!(settings.bit_depth, 16);
    }

    #[test]
    fn test_optimize_updates_live_settings() {
        let optimizer = AudioQualityOptimizer::new();
        let returned = optimizer.optimize_for_network(NetworkConditions::new(600.0, 2, 50));
        assert_eq!(optimizer.current_settings(), returned);
    }

    #[test]
    fn test_apply_preset() {
        let optimizer = AudioQualityOptimizer::new();
        optimizer.apply_preset(QualityPreset::Low);
        assert_eq!(optimizer.current_settings().sample_rate, 8_000);
    }

    #[test]
    fn test_convert_format_failure_returns_none() {
        let mut converter = MockPcmConverter::new();
        converter.expect_convert().returning(|_, _, _| {
            Err(VoxflowError::FormatConversion("resampler init".to_string()))
        });

        let optimizer = AudioQualityOptimizer::with_converter(Arc::new(converter));
        let result = optimizer.convert_format(
            &[0, 0],
            PcmFormat::new(48_000, 1),
            PcmFormat::new(16_000, 1),
        );
        assert_eq!(result, None);
    }

    #[test]
    fn test_convert_format_success() {
        let mut converter = MockPcmConverter::new();
        converter
            .expect_convert()
            .returning(|pcm, _, _| Ok(pcm.to_vec()));

        let optimizer = AudioQualityOptimizer::with_converter(Arc::new(converter));
        let result = optimizer.convert_format(
            &[1, 2, 3, 4],
            PcmFormat::new(16_000, 1),
            PcmFormat::new(16_000, 1),
        );
        assert_eq!(result, Some(vec![1, 2, 3, 4]));
    }
}
