//! Single-pass audio statistics for telemetry and UI meters.

use serde::{Deserialize, Serialize};

/// Full-scale reference for 16-bit samples.
const FULL_SCALE: f64 = 32_768.0;

/// Samples with magnitude above this count as clipped.
const CLIP_THRESHOLD: i32 = 32_000;

/// Snapshot of signal statistics for one analyzed buffer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioQualityStats {
    /// Average volume in dBFS.
    pub average_volume_db: f64,
    /// Peak volume in dBFS.
    pub peak_volume_db: f64,
    /// Number of samples at or near full scale.
    pub clipped_samples: u32,
    /// Coarse signal-to-noise estimate in dB.
    pub snr_db: f64,
    /// Reserved: packet loss observed by the transport.
    pub packet_loss: u32,
    /// Reserved: jitter observed by the transport, in milliseconds.
    pub jitter_ms: f64,
}

impl AudioQualityStats {
    /// Converts the snapshot to a dictionary for telemetry sinks.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "average_volume_db": self.average_volume_db,
            "peak_volume_db": self.peak_volume_db,
            "clipped_samples": self.clipped_samples,
            "snr_db": self.snr_db,
        })
    }
}

/// Analyzes an interleaved little-endian 16-bit PCM buffer.
///
/// One pass computes mean magnitude, RMS, peak, and clipped-sample count;
/// volumes are derived in dBFS with a floor of one sample unit so silence
/// never reaches `log10(0)`. The SNR estimate assumes a noise floor of 1%
/// of the mean magnitude. Buffers shorter than one sample return the
/// zeroed snapshot.
#[must_use]
pub fn analyze_audio(pcm: &[u8]) -> AudioQualityStats {
    let sample_count = pcm.len() / 2;
    if sample_count == 0 {
        return AudioQualityStats::default();
    }

    let mut sum_magnitude = 0.0f64;
    let mut sum_squares = 0.0f64;
    let mut peak = 0i32;
    let mut clipped = 0u32;

    for chunk in pcm.chunks_exact(2) {
        let magnitude = i32::from(i16::from_le_bytes([chunk[0], chunk[1]])).abs();
        sum_magnitude += f64::from(magnitude);
        sum_squares += f64::from(magnitude) * f64::from(magnitude);
        peak = peak.max(magnitude);
        if magnitude > CLIP_THRESHOLD {
            clipped += 1;
        }
    }

    let mean = sum_magnitude / sample_count as f64;
    let rms = (sum_squares / sample_count as f64).sqrt();
    let noise_floor = (mean * 0.01).max(1.0);

    AudioQualityStats {
        average_volume_db: to_dbfs(mean),
        peak_volume_db: to_dbfs(f64::from(peak)),
        clipped_samples: clipped,
        snr_db: 20.0 * (rms.max(1.0) / noise_floor).log10(),
        packet_loss: 0,
        jitter_ms: 0.0,
    }
}

fn to_dbfs(amplitude: f64) -> f64 {
    20.0 * (amplitude.max(1.0) / FULL_SCALE).log10()
}
