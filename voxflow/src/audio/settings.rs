//! Audio encoding settings and quality presets.

use serde::{Deserialize, Serialize};

/// Named quality tiers for voice encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    /// 8 kHz mono at 16 kbps, for constrained links.
    Low,
    /// 16 kHz mono at 32 kbps.
    #[default]
    Medium,
    /// 24 kHz stereo at 64 kbps.
    High,
    /// 48 kHz stereo at 128 kbps.
    VeryHigh,
    /// Caller-supplied settings; no defaults applied.
    Custom,
}

/// Encoding parameters handed to the capture/encode layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioQualitySettings {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample. Always 16 for the PCM pipeline.
    pub bit_depth: u16,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Target encoder bitrate in bits per second.
    pub bitrate: u32,
    /// Whether the encoder applies noise suppression.
    pub noise_suppression: bool,
    /// Whether the encoder applies echo cancellation.
    pub echo_cancellation: bool,
    /// Whether automatic gain control is enabled.
    pub automatic_gain_control: bool,
    /// Packet-loss concealment aggressiveness, 0 (off) to 10 (maximum).
    pub plc_aggressiveness: u8,
}

impl Default for AudioQualitySettings {
    fn default() -> Self {
        Self::from_preset(QualityPreset::Medium)
    }
}

impl AudioQualitySettings {
    /// Returns the settings tuple for a preset.
    ///
    /// `Custom` returns the `Medium` tuple as a starting point; callers own
    /// the final values.
    #[must_use]
    pub fn from_preset(preset: QualityPreset) -> Self {
        let (sample_rate, channels, bitrate, plc, echo) = match preset {
            QualityPreset::Low => (8_000, 1, 16_000, 8, false),
            QualityPreset::Medium | QualityPreset::Custom => (16_000, 1, 32_000, 5, true),
            QualityPreset::High => (24_000, 2, 64_000, 2, true),
            QualityPreset::VeryHigh => (48_000, 2, 128_000, 2, true),
        };

        Self {
            sample_rate,
            bit_depth: 16,
            channels,
            bitrate,
            noise_suppression: true,
            echo_cancellation: echo,
            automatic_gain_control: true,
            plc_aggressiveness: plc,
        }
    }

    /// Sets the sample rate.
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets the channel count.
    #[must_use]
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the target bitrate.
    #[must_use]
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Sets the packet-loss concealment aggressiveness.
    #[must_use]
    pub fn with_plc_aggressiveness(mut self, level: u8) -> Self {
        self.plc_aggressiveness = level;
        self
    }
}
