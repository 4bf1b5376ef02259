//! # Voxflow
//!
//! Voice quality adaptation and traffic shaping for real-time chat clients.
//!
//! Voxflow is the layer between a client's UI/capture pipeline and its
//! network transport:
//!
//! - **Adaptive audio quality**: translate bandwidth/loss/latency telemetry
//!   into encoder settings, with noise gating, AGC, and buffer analysis over
//!   raw 16-bit PCM
//! - **Traffic shaping**: keyed token-bucket throttling, debouncing, and
//!   batching between UI events and the outbound send path
//! - **Resilience**: retry with exponential backoff and jitter around any
//!   transient network call, with cooperative cancellation throughout
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use voxflow::prelude::*;
//!
//! let optimizer = AudioQualityOptimizer::new();
//! let settings = optimizer.optimize_for_network(NetworkConditions::new(600.0, 2, 50));
//!
//! let throttler = MessageThrottler::new(ThrottleConfig::default());
//! if throttler.try_acquire(&channel_id) {
//!     send_message(&channel_id, text).await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod audio;
pub mod cancellation;
pub mod errors;
pub mod flow;
pub mod observability;
pub mod retry;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::audio::{
        analyze_audio, apply_agc, apply_agc_in_place, apply_noise_gate,
        apply_noise_gate_in_place, AudioQualityOptimizer, AudioQualitySettings,
        AudioQualityStats, NetworkConditions, PcmConverter, PcmFormat, QualityPreset,
        RubatoConverter,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::errors::{RetryError, VoxflowError};
    pub use crate::flow::{
        BatchConfig, Batcher, Debouncer, MessageThrottler, ThrottleConfig, TokenBucket,
    };
    pub use crate::observability::init_tracing;
    pub use crate::retry::{RetryPolicy, RetryableError};
}
