//! Core LDV post-processing modules

pub mod average;
pub mod demodulate;
pub mod discriminate;
pub mod filter;
pub mod pipeline;
pub mod spectrum;

// Re-export main types
pub use average::ensemble_mean;
pub use demodulate::{from_channel_pair, QuadratureDemodulator};
pub use discriminate::FrequencyDiscriminator;
pub use filter::{lowpass, FilterSpec};
pub use pipeline::{IqProcessor, PostProcessing, PROCESSED_FIELD};
pub use spectrum::dominant_frequency;
