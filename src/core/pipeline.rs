//! End-to-end IQ demodulation post-processing.
//!
//! One `process` call turns a structured acquisition record into the same
//! record with a velocity trace merged in: locate the raw channel field by
//! suffix, demodulate each repeated sub-acquisition, discriminate phase
//! rate into frequency, scale to velocity, low-pass, ensemble-average and
//! pad back to the raw sample count. Records inside one update are
//! independent, so the per-record stage runs in parallel under the
//! `parallel` feature.

use ndarray::{s, Array1};

use crate::config::{AveragingMode, DemodScheme, ProcessorConfig};
use crate::core::average::ensemble_mean;
use crate::core::demodulate::{from_channel_pair, QuadratureDemodulator};
use crate::core::discriminate::FrequencyDiscriminator;
use crate::core::filter::{lowpass, FilterSpec};
use crate::core::spectrum::dominant_frequency;
use crate::sink::{NullSink, TraceSink, VelocityFrame};
use crate::types::{
    Baseband, ChannelData, FieldValue, LdvError, LdvResult, Metadata, StructuredRecord, Trace,
};

/// Name of the field holding the post-processed data
pub const PROCESSED_FIELD: &str = "IQ-demodulation-data";

/// Shared lifecycle of every post-processing stage: validate once against
/// the scan metadata, transform each update, release at the end of the
/// scan.
pub trait PostProcessing {
    /// Validate configuration against scan metadata and stamp the
    /// descriptor keys this stage contributes. Fatal errors here abort
    /// the run before any update executes.
    fn configure(&mut self, metadata: &mut Metadata) -> LdvResult<()>;

    /// Process one update's record into its augmented form
    fn process(&mut self, record: &StructuredRecord) -> LdvResult<StructuredRecord>;

    /// End-of-scan hook
    fn finalize(&mut self) -> LdvResult<()> {
        Ok(())
    }
}

/// IQ demodulation processor: raw interference records in, velocity out
pub struct IqProcessor {
    config: ProcessorConfig,
    sampling_rate: Option<f64>,
    carrier: Option<f64>,
    updates: usize,
    sink: Box<dyn TraceSink>,
}

impl IqProcessor {
    /// Create a processor with no visualization attached
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_sink(config, Box::new(NullSink))
    }

    /// Create a processor that emits each update's velocity frame to `sink`
    pub fn with_sink(config: ProcessorConfig, sink: Box<dyn TraceSink>) -> Self {
        let carrier = match &config.demod {
            DemodScheme::Heterodyne {
                carrier_frequency, ..
            } => *carrier_frequency,
            DemodScheme::DirectIq => None,
        };
        Self {
            config,
            sampling_rate: None,
            carrier,
            updates: 0,
            sink,
        }
    }

    /// Updates processed so far
    pub fn updates(&self) -> usize {
        self.updates
    }

    fn post_filter_spec(&self, fs: f64) -> FilterSpec {
        FilterSpec::new(self.config.lowpass_cutoff, fs, self.config.lowpass_corners)
            .zero_phase(self.config.lowpass_zero_phase)
    }

    /// Carrier for heterodyne demodulation, estimated from the first
    /// record's spectrum when the configuration left it open
    fn resolve_carrier(&mut self, data: &ChannelData, fs: f64) -> LdvResult<f64> {
        if let Some(fc) = self.carrier {
            return Ok(fc);
        }
        let first = data.slice(s![0, 0, ..]).to_owned();
        let fc = dominant_frequency(&first, fs)?;
        log::info!(
            "carrier frequency not configured; using spectral peak at {:.3e} Hz",
            fc
        );
        self.carrier = Some(fc);
        Ok(fc)
    }

    /// Run the full pipeline over every record of one update
    fn process_records(&mut self, data: &ChannelData, fs: f64) -> LdvResult<Trace> {
        let (channels, records, samples) = data.dim();
        if records == 0 || samples == 0 {
            return Err(LdvError::Processing(
                "record data holds no samples".to_string(),
            ));
        }

        let demod = match self.config.demod.clone() {
            DemodScheme::Heterodyne {
                demod_cutoff,
                corners,
                zero_phase,
                ..
            } => {
                if channels < 1 {
                    return Err(LdvError::Processing(
                        "heterodyne demodulation needs one channel".to_string(),
                    ));
                }
                let spec = FilterSpec::new(demod_cutoff, fs, corners).zero_phase(zero_phase);
                let carrier = self.resolve_carrier(data, fs)?;
                Some(QuadratureDemodulator::new(carrier, spec))
            }
            DemodScheme::DirectIq => {
                if channels < 2 {
                    return Err(LdvError::Processing(format!(
                        "direct I/Q demodulation needs a channel pair, got {} channel(s)",
                        channels
                    )));
                }
                None
            }
        };

        let discriminator = FrequencyDiscriminator::new(fs, self.config.wavelength)
            .round_trip(self.config.round_trip)
            .instability(self.config.instability_threshold, self.config.instability);
        let y_shift = self.config.y_shift;

        // Demodulate and discriminate one record into a raw velocity
        // trace of length samples - 1
        let record_velocity = |r: usize| -> LdvResult<Trace> {
            let baseband: Baseband = match demod.as_ref() {
                Some(demod) => {
                    let trace = data.slice(s![0, r, ..]).mapv(|v| v + y_shift);
                    demod.demodulate(&trace)?
                }
                None => {
                    let i = data.slice(s![0, r, ..]).to_owned();
                    let q = data.slice(s![1, r, ..]).to_owned();
                    from_channel_pair(&i, &q, y_shift)?
                }
            };
            discriminator.velocity(&baseband)
        };

        log::debug!("processing {} record(s) of {} samples", records, samples);

        #[cfg(feature = "parallel")]
        let velocities: LdvResult<Vec<Trace>> = {
            use rayon::prelude::*;
            (0..records).into_par_iter().map(record_velocity).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let velocities: LdvResult<Vec<Trace>> = (0..records).map(record_velocity).collect();
        let velocities = velocities?;

        let post_spec = self.post_filter_spec(fs);
        let combined = match self.config.averaging {
            AveragingMode::AverageThenFilter => lowpass(&ensemble_mean(&velocities)?, &post_spec)?,
            AveragingMode::FilterThenAverage => {
                let filtered: LdvResult<Vec<Trace>> = velocities
                    .iter()
                    .map(|trace| lowpass(trace, &post_spec))
                    .collect();
                ensemble_mean(&filtered?)?
            }
        };

        // Differencing dropped one sample; duplicate the final one so the
        // output length matches the raw trace length
        Ok(pad_with_last(&combined))
    }
}

/// Restore the raw sample count by duplicating the final sample
fn pad_with_last(trace: &Trace) -> Trace {
    let mut padded = trace.to_vec();
    if let Some(&last) = padded.last() {
        padded.push(last);
    }
    Array1::from_vec(padded)
}

impl PostProcessing for IqProcessor {
    fn configure(&mut self, metadata: &mut Metadata) -> LdvResult<()> {
        let fs = metadata.sampling_rate()?;
        self.config.validate(fs)?;
        self.sampling_rate = Some(fs);
        metadata.insert("demodulation", crate::types::MetaValue::Text("IQ".to_string()));
        log::info!(
            "IQ demodulation configured: fs = {:.3e} Hz, field ending '{}'",
            fs,
            self.config.field_ending
        );
        Ok(())
    }

    fn process(&mut self, record: &StructuredRecord) -> LdvResult<StructuredRecord> {
        let fs = self.sampling_rate.ok_or_else(|| {
            LdvError::Configuration("configure() must run before process()".to_string())
        })?;

        let field_name = record
            .find_suffix(&self.config.field_ending)
            .ok_or_else(|| LdvError::FieldNotFound(self.config.field_ending.clone()))?
            .to_string();
        let data = match record.get(&field_name) {
            Some(FieldValue::Records(data)) => data,
            _ => {
                return Err(LdvError::Processing(format!(
                    "field '{}' does not hold record data",
                    field_name
                )))
            }
        };

        let velocity = self.process_records(data, fs)?;

        // Copy-then-remove / copy-then-append: untouched fields keep their
        // original order, the processed field lands at the end
        let mut output = StructuredRecord::new();
        for (name, value) in record.iter() {
            if self.config.remove_trace_data && name == field_name {
                continue;
            }
            output.push(name, value.clone());
        }
        output.push(PROCESSED_FIELD, FieldValue::Trace(velocity.clone()));

        if self.config.plot {
            let times_us =
                Array1::from_iter((0..velocity.len()).map(|i| i as f64 * 1e6 / fs));
            self.sink.emit(VelocityFrame {
                update: self.updates,
                times_us,
                velocity,
            });
        }

        self.updates += 1;
        Ok(output)
    }

    fn finalize(&mut self) -> LdvResult<()> {
        log::info!("IQ demodulation finished after {} update(s)", self.updates);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetaValue;
    use ndarray::Array3;

    fn metadata(fs: f64) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("sampling_rate", MetaValue::Float(fs));
        meta
    }

    #[test]
    fn test_configure_requires_sampling_rate() {
        let mut processor = IqProcessor::new(ProcessorConfig::default());
        let mut meta = Metadata::new();
        assert!(matches!(
            processor.configure(&mut meta).unwrap_err(),
            LdvError::Configuration(_)
        ));
    }

    #[test]
    fn test_configure_stamps_demodulation() {
        let mut processor = IqProcessor::new(ProcessorConfig::default());
        let mut meta = metadata(1e8);
        processor.configure(&mut meta).unwrap();
        assert_eq!(
            meta.get("demodulation"),
            Some(&MetaValue::Text("IQ".to_string()))
        );
    }

    #[test]
    fn test_process_before_configure_fails() {
        let mut processor = IqProcessor::new(ProcessorConfig::default());
        let record = StructuredRecord::new();
        assert!(matches!(
            processor.process(&record).unwrap_err(),
            LdvError::Configuration(_)
        ));
    }

    #[test]
    fn test_missing_field_reported() {
        let mut processor = IqProcessor::new(ProcessorConfig::default());
        let mut meta = metadata(1e8);
        processor.configure(&mut meta).unwrap();

        let mut record = StructuredRecord::new();
        record.push("position", FieldValue::Scalar(0.0));
        match processor.process(&record).unwrap_err() {
            LdvError::FieldNotFound(suffix) => assert_eq!(suffix, "trace"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_direct_iq_needs_two_channels() {
        let config = ProcessorConfig {
            demod: crate::config::DemodScheme::DirectIq,
            ..Default::default()
        };
        let mut processor = IqProcessor::new(config);
        let mut meta = metadata(1e8);
        processor.configure(&mut meta).unwrap();

        let mut record = StructuredRecord::new();
        record.push(
            "scope-trace",
            FieldValue::Records(Array3::zeros((1, 2, 256))),
        );
        assert!(matches!(
            processor.process(&record).unwrap_err(),
            LdvError::Processing(_)
        ));
    }

    #[test]
    fn test_pad_with_last() {
        let trace = Array1::from_vec(vec![1.0, 2.0, 3.0]);
        let padded = pad_with_last(&trace);
        assert_eq!(padded.to_vec(), vec![1.0, 2.0, 3.0, 3.0]);
    }
}
