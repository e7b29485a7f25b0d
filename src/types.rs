use ndarray::{Array1, Array2, Array3};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw or processed waveform (amplitude per sample)
pub type Trace = Array1<f64>;

/// Repeated sub-acquisitions within one update (records x samples)
pub type RecordSet = Array2<f64>;

/// Multi-channel record data as captured by the digitizer
/// (channels x records x samples)
pub type ChannelData = Array3<f64>;

/// Complex baseband phasor: I in the real part, Q in the imaginary part
pub type Baseband = Array1<Complex<f64>>;

/// Scalar metadata value attached to an acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Float(f64),
    Int(i64),
    Text(String),
    Bool(bool),
}

impl MetaValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(v) => Some(*v),
            MetaValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// Acquisition metadata shared by every update of a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    values: HashMap<String, MetaValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.values.get(key)
    }

    /// The digitizer sampling rate in Hz.
    ///
    /// Every post-processing stage needs this; its absence is a fatal
    /// configuration error raised before any update executes.
    pub fn sampling_rate(&self) -> LdvResult<f64> {
        self.values
            .get("sampling_rate")
            .and_then(MetaValue::as_f64)
            .ok_or_else(|| {
                LdvError::Configuration(
                    "'sampling_rate' is not available in the metadata - \
                     IQ demodulation postprocessing cannot be performed"
                        .to_string(),
                )
            })
    }
}

/// A single value stored in a structured acquisition record
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// Scalar reading (e.g. a stage position)
    Scalar(f64),
    /// Free-form annotation
    Text(String),
    /// One processed waveform
    Trace(Trace),
    /// Raw digitizer capture (channels x records x samples)
    Records(ChannelData),
}

/// Ordered mapping from field name to value, one per acquisition update.
///
/// Field order is deterministic: iteration yields fields in insertion
/// order, and the pipeline preserves that order for every field it does
/// not touch.
#[derive(Debug, Clone, Default)]
pub struct StructuredRecord {
    fields: Vec<(String, FieldValue)>,
}

impl StructuredRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping insertion order
    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// First field whose name ends with `suffix`
    pub fn find_suffix(&self, suffix: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.ends_with(suffix))
            .map(|(n, _)| n.as_str())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Error types for LDV post-processing
#[derive(Debug, thiserror::Error)]
pub enum LdvError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid filter spec: {0}")]
    InvalidFilterSpec(String),

    #[error("insufficient samples: filter requires at least {required}, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    #[error("field ending in '{0}' not found - cannot perform postprocessing")]
    FieldNotFound(String),

    #[error(
        "numerical instability: I^2+Q^2 = {magnitude:.3e} at sample {index} \
         is below the floor {threshold:.3e}"
    )]
    NumericalInstability {
        index: usize,
        magnitude: f64,
        threshold: f64,
    },

    #[error("processing error: {0}")]
    Processing(String),
}

/// Result type for LDV operations
pub type LdvResult<T> = Result<T, LdvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_rate_present() {
        let mut meta = Metadata::new();
        meta.insert("sampling_rate", MetaValue::Float(1e8));
        assert_eq!(meta.sampling_rate().unwrap(), 1e8);
    }

    #[test]
    fn test_sampling_rate_missing() {
        let meta = Metadata::new();
        let err = meta.sampling_rate().unwrap_err();
        assert!(matches!(err, LdvError::Configuration(_)));
    }

    #[test]
    fn test_record_field_order() {
        let mut record = StructuredRecord::new();
        record.push("position", FieldValue::Scalar(1.5));
        record.push("ATS660-trace", FieldValue::Scalar(0.0));
        record.push("comment", FieldValue::Text("shot 1".into()));

        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["position", "ATS660-trace", "comment"]);
        assert_eq!(record.find_suffix("trace"), Some("ATS660-trace"));
        assert_eq!(record.find_suffix("missing"), None);
    }
}
