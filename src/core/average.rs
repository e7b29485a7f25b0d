//! Ensemble averaging of per-record traces.
//!
//! Repeated records of the same nominal event are combined by an
//! elementwise arithmetic mean. Whether the mean is taken before or after
//! the final low-pass is the pipeline's choice; this module only supplies
//! the mean itself.

use crate::types::{LdvError, LdvResult, Trace};

/// Elementwise mean across equal-length record traces
pub fn ensemble_mean(records: &[Trace]) -> LdvResult<Trace> {
    let first = records
        .first()
        .ok_or_else(|| LdvError::Processing("cannot average zero records".to_string()))?;
    let len = first.len();
    for (idx, record) in records.iter().enumerate() {
        if record.len() != len {
            return Err(LdvError::Processing(format!(
                "record {} has {} samples, expected {}",
                idx,
                record.len(),
                len
            )));
        }
    }

    let mut sum = Trace::zeros(len);
    for record in records {
        sum += record;
    }
    Ok(sum / records.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    #[test]
    fn test_mean_of_two_records() {
        let a = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let b = Array1::from_vec(vec![3.0, 2.0, 1.0]);
        let mean = ensemble_mean(&[a, b]).unwrap();
        assert_abs_diff_eq!(mean[0], 2.0);
        assert_abs_diff_eq!(mean[1], 2.0);
        assert_abs_diff_eq!(mean[2], 2.0);
    }

    #[test]
    fn test_identical_records_idempotent() {
        let record = Array1::from_vec(vec![0.25, -1.5, 7.0, 0.0]);
        let mean = ensemble_mean(&[record.clone(), record.clone(), record.clone()]).unwrap();
        for (m, r) in mean.iter().zip(record.iter()) {
            assert_abs_diff_eq!(*m, *r, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(ensemble_mean(&[]).is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let a = Array1::from_vec(vec![1.0, 2.0]);
        let b = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            ensemble_mean(&[a, b]).unwrap_err(),
            LdvError::Processing(_)
        ));
    }
}
