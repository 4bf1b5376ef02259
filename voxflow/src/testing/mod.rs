//! Test fixtures and signal generators.
//!
//! Public so downstream crates can reuse the PCM generators in their own
//! tests and benchmarks.

mod signal;

pub use signal::{constant_pcm, noise_pcm, silence_pcm, sine_pcm};
