//! Spectral utilities for carrier diagnostics.
//!
//! When the carrier frequency is not configured, the processor estimates
//! it from the magnitude spectrum of the first captured record. The DC
//! component is removed before the transform so a large digitizer offset
//! cannot masquerade as the carrier.

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::types::{LdvError, LdvResult, Trace};

/// Frequency of the strongest spectral component in `(0, fs/2)`.
pub fn dominant_frequency(trace: &Trace, sampling_rate: f64) -> LdvResult<f64> {
    let n = trace.len();
    if n < 4 {
        return Err(LdvError::InsufficientSamples {
            required: 4,
            actual: n,
        });
    }
    if sampling_rate <= 0.0 {
        return Err(LdvError::Processing(format!(
            "sampling rate must be positive, got {} Hz",
            sampling_rate
        )));
    }

    let mean = trace.sum() / n as f64;
    let mut buffer: Vec<Complex<f64>> = trace
        .iter()
        .map(|&v| Complex::new(v - mean, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    // Positive-frequency bins only; bin 0 is the (removed) DC term
    let (peak_bin, _) = buffer[1..n / 2]
        .iter()
        .enumerate()
        .map(|(idx, z)| (idx + 1, z.norm_sqr()))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| LdvError::Processing("empty spectrum".to_string()))?;

    Ok(peak_bin as f64 * sampling_rate / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn test_finds_synthetic_carrier() {
        let fs = 1e8;
        let n = 1000;
        // 40 MHz lands exactly on bin 400
        let trace = Array1::from_iter(
            (0..n).map(|i| (2.0 * std::f64::consts::PI * 40e6 * i as f64 / fs).cos()),
        );
        let freq = dominant_frequency(&trace, fs).unwrap();
        assert_relative_eq!(freq, 40e6, epsilon = fs / n as f64);
    }

    #[test]
    fn test_dc_offset_is_ignored() {
        let fs = 1e8;
        let n = 1000;
        let trace = Array1::from_iter(
            (0..n).map(|i| 50.0 + 0.1 * (2.0 * std::f64::consts::PI * 5e6 * i as f64 / fs).sin()),
        );
        let freq = dominant_frequency(&trace, fs).unwrap();
        assert_relative_eq!(freq, 5e6, epsilon = fs / n as f64);
    }

    #[test]
    fn test_too_short_trace() {
        let trace = Array1::from_vec(vec![1.0, 2.0]);
        assert!(dominant_frequency(&trace, 1e8).is_err());
    }
}
