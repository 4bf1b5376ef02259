//! Voice quality adaptation and PCM buffer processing.
//!
//! [`AudioQualityOptimizer`] turns network telemetry into encoder settings;
//! the [`dsp`] functions shape raw capture buffers before transmission and
//! [`analysis`] produces the statistics shown in quality meters.

pub mod analysis;
pub mod convert;
pub mod dsp;
pub mod optimizer;
pub mod settings;

pub use analysis::{analyze_audio, AudioQualityStats};
pub use convert::{PcmConverter, PcmFormat, RubatoConverter};
pub use dsp::{
    apply_agc, apply_agc_in_place, apply_noise_gate, apply_noise_gate_in_place,
    DEFAULT_AGC_TARGET_DB, DEFAULT_GATE_THRESHOLD_DB,
};
pub use optimizer::{AudioQualityOptimizer, NetworkConditions};
pub use settings::{AudioQualitySettings, QualityPreset};
