//! Arctangent-free frequency discrimination of I/Q baseband.
//!
//! The instantaneous frequency is the phase rate of the baseband phasor,
//! estimated from one-sample differences without ever unwrapping an angle:
//!
//! ```text
//! freq[n-1] = (I[n]*dQ - Q[n]*dI) / (dt * (I[n]^2 + Q[n]^2) * 2*pi)
//! ```
//!
//! The `I^2 + Q^2` normalization cancels the signal amplitude, so the
//! estimate depends only on the rotation rate. It also means a fading
//! carrier drives the denominator toward zero; the discriminator watches
//! for that and either aborts or holds the previous estimate, so NaN/Inf
//! never reach downstream storage.

use crate::config::InstabilityPolicy;
use crate::types::{Baseband, LdvError, LdvResult, Trace};

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

/// Converts baseband phase rate into frequency and velocity
#[derive(Debug, Clone)]
pub struct FrequencyDiscriminator {
    /// Sampling interval, seconds
    dt: f64,
    /// Optical wavelength, meters
    wavelength: f64,
    /// Halve the velocity for a double-pass beam geometry
    round_trip: bool,
    /// Denominator floor relative to the record's mean I^2+Q^2
    threshold: f64,
    policy: InstabilityPolicy,
}

impl FrequencyDiscriminator {
    pub fn new(sampling_rate: f64, wavelength: f64) -> Self {
        Self {
            dt: 1.0 / sampling_rate,
            wavelength,
            round_trip: false,
            threshold: 1e-6,
            policy: InstabilityPolicy::HoldLast,
        }
    }

    pub fn round_trip(mut self, round_trip: bool) -> Self {
        self.round_trip = round_trip;
        self
    }

    pub fn instability(mut self, threshold: f64, policy: InstabilityPolicy) -> Self {
        self.threshold = threshold;
        self.policy = policy;
        self
    }

    /// Instantaneous frequency in Hz at each sample boundary.
    ///
    /// Output length is one less than the baseband length; differencing
    /// consumes the first sample.
    pub fn instantaneous_frequency(&self, baseband: &Baseband) -> LdvResult<Trace> {
        let n = baseband.len();
        if n < 2 {
            return Err(LdvError::InsufficientSamples {
                required: 2,
                actual: n,
            });
        }

        let mean_power = baseband.iter().map(|z| z.norm_sqr()).sum::<f64>() / n as f64;
        let floor = self.threshold * mean_power;

        let mut freq = Vec::with_capacity(n - 1);
        let mut held = 0.0;
        let mut unstable = 0usize;
        for k in 1..n {
            let z = baseband[k];
            let dz = z - baseband[k - 1];
            let denominator = z.norm_sqr();
            if denominator <= floor {
                match self.policy {
                    InstabilityPolicy::Error => {
                        return Err(LdvError::NumericalInstability {
                            index: k,
                            magnitude: denominator,
                            threshold: floor,
                        });
                    }
                    InstabilityPolicy::HoldLast => {
                        unstable += 1;
                        freq.push(held);
                        continue;
                    }
                }
            }
            let numerator = z.re * dz.im - z.im * dz.re;
            let value = numerator / (self.dt * denominator * TWO_PI);
            held = value;
            freq.push(value);
        }

        if unstable > 0 {
            log::warn!(
                "discriminator denominator fell below {:.3e} on {} of {} samples; \
                 previous estimates were held",
                floor,
                unstable,
                n - 1
            );
        }
        Ok(Trace::from_vec(freq))
    }

    /// Velocity in m/s: frequency scaled by the optical wavelength.
    ///
    /// The Doppler geometry factor is a property of the bench and rides in
    /// `wavelength` (or the `round_trip` flag for a double-pass path).
    pub fn velocity(&self, baseband: &Baseband) -> LdvResult<Trace> {
        let scale = if self.round_trip {
            self.wavelength / 2.0
        } else {
            self.wavelength
        };
        Ok(self.instantaneous_frequency(baseband)? * scale)
    }
}
