use ndarray::Array3;
use osldv::{
    ChannelSink, FieldValue, IqProcessor, MetaValue, Metadata, PostProcessing, ProcessorConfig,
    StructuredRecord, PROCESSED_FIELD,
};

const FS: f64 = 1e8;
const SAMPLES: usize = 1000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn metadata() -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("sampling_rate", MetaValue::Float(FS));
    meta
}

fn bench_record() -> StructuredRecord {
    let data = Array3::from_shape_fn((1, 2, SAMPLES), |(_, _, n)| {
        (2.0 * std::f64::consts::PI * 41e6 * n as f64 / FS).cos()
    });
    let mut record = StructuredRecord::new();
    record.push("stage-position", FieldValue::Scalar(3.0));
    record.push("ATS9440-trace", FieldValue::Records(data));
    record.push("operator-note", FieldValue::Text("run 7".into()));
    record
}

#[test]
fn test_merge_keeps_raw_field_and_order() {
    init_logging();
    let mut processor = IqProcessor::new(ProcessorConfig::default());
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();

    let output = processor.process(&bench_record()).unwrap();
    let names: Vec<&str> = output.field_names().collect();
    assert_eq!(
        names,
        vec![
            "stage-position",
            "ATS9440-trace",
            "operator-note",
            PROCESSED_FIELD
        ]
    );
    // Untouched fields pass through unchanged
    assert!(matches!(
        output.get("stage-position"),
        Some(FieldValue::Scalar(v)) if *v == 3.0
    ));
}

#[test]
fn test_merge_drops_raw_field_when_requested() {
    init_logging();
    let config = ProcessorConfig {
        remove_trace_data: true,
        ..Default::default()
    };
    let mut processor = IqProcessor::new(config);
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();

    let output = processor.process(&bench_record()).unwrap();
    let names: Vec<&str> = output.field_names().collect();
    assert_eq!(
        names,
        vec!["stage-position", "operator-note", PROCESSED_FIELD]
    );
}

#[test]
fn test_metadata_stamped_once_configured() {
    init_logging();
    let mut processor = IqProcessor::new(ProcessorConfig::default());
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();
    assert_eq!(
        meta.get("demodulation"),
        Some(&MetaValue::Text("IQ".to_string()))
    );
    // Pre-existing keys are untouched
    assert_eq!(meta.get("sampling_rate"), Some(&MetaValue::Float(FS)));
}

#[test]
fn test_plot_emits_frames_through_sink() {
    init_logging();
    let config = ProcessorConfig {
        plot: true,
        ..Default::default()
    };
    let (sink, rx) = ChannelSink::new();
    let mut processor = IqProcessor::with_sink(config, Box::new(sink));
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();

    processor.process(&bench_record()).unwrap();
    processor.process(&bench_record()).unwrap();

    let first = rx.try_recv().unwrap();
    let second = rx.try_recv().unwrap();
    assert_eq!(first.update, 0);
    assert_eq!(second.update, 1);
    assert_eq!(first.velocity.len(), SAMPLES);
    assert_eq!(first.times_us.len(), SAMPLES);
    // Time axis in microseconds at 100 MS/s: 10 ns per sample
    assert!((first.times_us[1] - 0.01).abs() < 1e-12);
}

#[test]
fn test_plot_disabled_emits_nothing() {
    init_logging();
    let (sink, rx) = ChannelSink::new();
    let mut processor = IqProcessor::with_sink(ProcessorConfig::default(), Box::new(sink));
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();

    processor.process(&bench_record()).unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_update_counter_and_finalize() {
    init_logging();
    let mut processor = IqProcessor::new(ProcessorConfig::default());
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();

    assert_eq!(processor.updates(), 0);
    processor.process(&bench_record()).unwrap();
    processor.process(&bench_record()).unwrap();
    assert_eq!(processor.updates(), 2);
    processor.finalize().unwrap();
}

#[test]
fn test_wrong_field_type_reported() {
    init_logging();
    let mut processor = IqProcessor::new(ProcessorConfig::default());
    let mut meta = metadata();
    processor.configure(&mut meta).unwrap();

    let mut record = StructuredRecord::new();
    record.push("ATS9440-trace", FieldValue::Scalar(1.0));
    assert!(matches!(
        processor.process(&record).unwrap_err(),
        osldv::LdvError::Processing(_)
    ));
}
