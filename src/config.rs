//! Processing configuration for the IQ demodulation pipeline.
//!
//! One explicit value, built by the caller and handed to the processor at
//! construction. Defaults reproduce the standard bench setup: 40 MHz
//! carrier, 5 MHz demodulation cutoff, 10 MHz zero-phase post-filter and a
//! 632.8 nm HeNe wavelength.

use serde::{Deserialize, Serialize};

use crate::types::{LdvError, LdvResult};

/// How the raw capture is turned into I/Q baseband
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DemodScheme {
    /// Mix a single channel against synthetic sin/cos references at the
    /// carrier frequency, then low-pass each product.
    Heterodyne {
        /// Carrier frequency in Hz. `None` asks the processor to estimate
        /// it from the spectrum of the first record.
        carrier_frequency: Option<f64>,
        /// Low-pass cutoff for the mixed products, Hz
        demod_cutoff: f64,
        /// Butterworth corners for the demodulation low-pass
        corners: usize,
        /// Zero-phase (forward-backward) demodulation filtering
        zero_phase: bool,
    },
    /// The digitizer already captured the channel pair: channel 0 is I,
    /// channel 1 is Q. No mixing is performed.
    DirectIq,
}

/// Whether records are averaged before or after the final low-pass.
///
/// The two orders are not numerically identical, so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AveragingMode {
    /// Average the per-record discriminator output, then filter once
    AverageThenFilter,
    /// Filter each record, then average
    FilterThenAverage,
}

/// What to do when the discriminator denominator collapses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstabilityPolicy {
    /// Abort the update with `LdvError::NumericalInstability`
    Error,
    /// Hold the previous finite estimate and log one warning per update
    HoldLast,
}

/// Full configuration surface of the post-processing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Suffix used to locate the raw channel field in each record
    pub field_ending: String,
    /// Drop the raw field from the output record (saving space)
    pub remove_trace_data: bool,
    /// DC offset added to each channel before demodulation, for unsigned
    /// or offset digitizer data
    pub y_shift: f64,
    /// Demodulation scheme and its parameters
    pub demod: DemodScheme,
    /// Cutoff of the post-discriminator low-pass, Hz
    pub lowpass_cutoff: f64,
    /// Butterworth corners for the post-discriminator low-pass
    pub lowpass_corners: usize,
    /// Zero-phase post-filtering
    pub lowpass_zero_phase: bool,
    /// Optical wavelength in meters; scales frequency to velocity
    pub wavelength: f64,
    /// Divide the velocity by two for a round-trip (double-pass) beam path
    pub round_trip: bool,
    /// Average before or after the post-filter
    pub averaging: AveragingMode,
    /// Discriminator denominator underflow handling
    pub instability: InstabilityPolicy,
    /// Denominator floor, relative to the mean I^2+Q^2 of the record
    pub instability_threshold: f64,
    /// Emit each update's velocity trace to the visualization sink
    pub plot: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            field_ending: "trace".to_string(),
            remove_trace_data: false,
            y_shift: 0.0,
            demod: DemodScheme::Heterodyne {
                carrier_frequency: Some(40e6),
                demod_cutoff: 5e6,
                corners: 4,
                zero_phase: false,
            },
            lowpass_cutoff: 10e6,
            lowpass_corners: 4,
            lowpass_zero_phase: true,
            wavelength: 632.8e-9,
            round_trip: false,
            averaging: AveragingMode::AverageThenFilter,
            instability: InstabilityPolicy::HoldLast,
            instability_threshold: 1e-6,
            plot: false,
        }
    }
}

impl ProcessorConfig {
    /// Validate the configuration against the acquisition sampling rate.
    ///
    /// Called once at configure time; every violation here is fatal before
    /// any update runs.
    pub fn validate(&self, sampling_rate: f64) -> LdvResult<()> {
        if sampling_rate <= 0.0 {
            return Err(LdvError::Configuration(format!(
                "sampling rate must be positive, got {} Hz",
                sampling_rate
            )));
        }
        if self.field_ending.is_empty() {
            return Err(LdvError::Configuration(
                "field_ending must not be empty".to_string(),
            ));
        }
        if self.wavelength <= 0.0 {
            return Err(LdvError::Configuration(format!(
                "wavelength must be positive, got {} m",
                self.wavelength
            )));
        }
        if !(0.0..1.0).contains(&self.instability_threshold) {
            return Err(LdvError::Configuration(format!(
                "instability_threshold must be in [0, 1), got {}",
                self.instability_threshold
            )));
        }
        let nyquist = sampling_rate / 2.0;
        if let DemodScheme::Heterodyne {
            carrier_frequency,
            demod_cutoff,
            corners,
            ..
        } = &self.demod
        {
            if let Some(fc) = carrier_frequency {
                if *fc <= 0.0 || *fc >= nyquist {
                    return Err(LdvError::Configuration(format!(
                        "carrier frequency {} Hz is outside (0, {}) Hz",
                        fc, nyquist
                    )));
                }
            }
            if *demod_cutoff <= 0.0 || *demod_cutoff >= nyquist {
                return Err(LdvError::InvalidFilterSpec(format!(
                    "demodulation cutoff {} Hz violates the Nyquist limit {} Hz",
                    demod_cutoff, nyquist
                )));
            }
            if *corners == 0 {
                return Err(LdvError::InvalidFilterSpec(
                    "demodulation filter needs at least one corner".to_string(),
                ));
            }
        }
        if self.lowpass_cutoff <= 0.0 || self.lowpass_cutoff >= nyquist {
            return Err(LdvError::InvalidFilterSpec(format!(
                "lowpass cutoff {} Hz violates the Nyquist limit {} Hz",
                self.lowpass_cutoff, nyquist
            )));
        }
        if self.lowpass_corners == 0 {
            return Err(LdvError::InvalidFilterSpec(
                "post-filter needs at least one corner".to_string(),
            ));
        }
        Ok(())
    }
}
