//! Butterworth low-pass filtering for trace data.
//!
//! The filter is realized as a cascade of second-order sections obtained
//! from the analog Butterworth prototype by bilinear transform, so a
//! `corners = 4` spec matches the conventional 4-corner low-pass used on
//! the acquisition side. Both causal and zero-phase (forward-backward)
//! application are supported; zero-phase runs the cascade twice and
//! therefore needs roughly double the settle length.

use crate::types::{LdvError, LdvResult, Trace};
use serde::{Deserialize, Serialize};

/// Low-pass filter specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Cutoff frequency, Hz
    pub cutoff: f64,
    /// Sampling rate of the trace, Hz
    pub sampling_rate: f64,
    /// Number of analog corners (filter order)
    pub corners: usize,
    /// Apply forward-backward for zero net phase delay
    pub zero_phase: bool,
}

impl FilterSpec {
    pub fn new(cutoff: f64, sampling_rate: f64, corners: usize) -> Self {
        Self {
            cutoff,
            sampling_rate,
            corners,
            zero_phase: false,
        }
    }

    pub fn zero_phase(mut self, zero_phase: bool) -> Self {
        self.zero_phase = zero_phase;
        self
    }

    /// Smallest input length the filter will accept.
    ///
    /// Shorter traces are dominated by the startup transient; zero-phase
    /// mode transits the cascade twice, doubling the requirement.
    pub fn min_samples(&self) -> usize {
        let settle = 3 * (self.corners + 1);
        if self.zero_phase {
            2 * settle
        } else {
            settle
        }
    }

    pub fn validate(&self) -> LdvResult<()> {
        if self.sampling_rate <= 0.0 {
            return Err(LdvError::InvalidFilterSpec(format!(
                "sampling rate must be positive, got {} Hz",
                self.sampling_rate
            )));
        }
        let nyquist = self.sampling_rate / 2.0;
        if self.cutoff <= 0.0 || self.cutoff >= nyquist {
            return Err(LdvError::InvalidFilterSpec(format!(
                "cutoff {} Hz violates the Nyquist limit {} Hz",
                self.cutoff, nyquist
            )));
        }
        if self.corners == 0 {
            return Err(LdvError::InvalidFilterSpec(
                "at least one corner is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// One normalized second-order section (a0 = 1)
#[derive(Debug, Clone, Copy)]
struct Sos {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Sos {
    /// Run the section over `data` in place, direct form II transposed
    fn run(&self, data: &mut [f64]) {
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for x in data.iter_mut() {
            let y = self.b0 * *x + s1;
            s1 = self.b1 * *x - self.a1 * y + s2;
            s2 = self.b2 * *x - self.a2 * y;
            *x = y;
        }
    }
}

/// Design the Butterworth low-pass cascade for a validated spec.
///
/// Analog poles sit on the circle of radius `wc` (the pre-warped cutoff);
/// conjugate pairs map to one biquad each via the bilinear transform, and
/// an odd order contributes one first-order section expressed as a
/// degenerate biquad.
fn design_lowpass(spec: &FilterSpec) -> Vec<Sos> {
    let n = spec.corners;
    let fs2 = 2.0 * spec.sampling_rate;
    let wc = fs2 * (std::f64::consts::PI * spec.cutoff / spec.sampling_rate).tan();
    let wc2 = wc * wc;

    let mut sections = Vec::with_capacity((n + 1) / 2);
    for k in 0..n / 2 {
        let theta = std::f64::consts::PI * (2 * k + n + 1) as f64 / (2 * n) as f64;
        let sigma = wc * theta.cos();
        let d0 = fs2 * fs2 - 2.0 * sigma * fs2 + wc2;
        sections.push(Sos {
            b0: wc2 / d0,
            b1: 2.0 * wc2 / d0,
            b2: wc2 / d0,
            a1: 2.0 * (wc2 - fs2 * fs2) / d0,
            a2: (fs2 * fs2 + 2.0 * sigma * fs2 + wc2) / d0,
        });
    }
    if n % 2 == 1 {
        // Real pole at -wc
        let d0 = fs2 + wc;
        sections.push(Sos {
            b0: wc / d0,
            b1: wc / d0,
            b2: 0.0,
            a1: (wc - fs2) / d0,
            a2: 0.0,
        });
    }
    sections
}

fn run_cascade(sections: &[Sos], data: &mut [f64]) {
    for section in sections {
        section.run(data);
    }
}

/// Apply the Butterworth low-pass described by `spec` to `trace`.
///
/// Output length equals input length. Causal mode runs the cascade once;
/// zero-phase mode runs it forward, then backward over the reversed
/// output, cancelling the group delay at the cost of a second settle.
pub fn lowpass(trace: &Trace, spec: &FilterSpec) -> LdvResult<Trace> {
    spec.validate()?;
    let required = spec.min_samples();
    if trace.len() < required {
        return Err(LdvError::InsufficientSamples {
            required,
            actual: trace.len(),
        });
    }

    let sections = design_lowpass(spec);
    let mut data = trace.to_vec();
    run_cascade(&sections, &mut data);
    if spec.zero_phase {
        data.reverse();
        run_cascade(&sections, &mut data);
        data.reverse();
    }
    Ok(Trace::from_vec(data))
}
