//! osldv: A Fast, Modular Heterodyne Laser-Doppler Velocimetry Post-Processor
//!
//! This library turns raw heterodyne optical-interference captures into
//! physical velocity traces: quadrature demodulation to I/Q baseband,
//! arctangent-free frequency discrimination, low-pass filtering and
//! ensemble averaging over repeated records, merged back into the
//! structured acquisition record one update at a time.

pub mod config;
pub mod core;
pub mod sink;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::config::{AveragingMode, DemodScheme, InstabilityPolicy, ProcessorConfig};
pub use crate::core::{
    dominant_frequency, ensemble_mean, lowpass, FilterSpec, FrequencyDiscriminator, IqProcessor,
    PostProcessing, QuadratureDemodulator, PROCESSED_FIELD,
};
pub use crate::sink::{ChannelSink, NullSink, TraceSink, VelocityFrame};
pub use crate::types::{
    Baseband, ChannelData, FieldValue, LdvError, LdvResult, MetaValue, Metadata, RecordSet,
    StructuredRecord, Trace,
};
