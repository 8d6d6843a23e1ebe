//! Loader integration tests (CSV and Parquet inputs)

use std::path::PathBuf;

use arrow::array::{Float64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use nmos_probe::config::ExtractionConfig;
use nmos_probe::loader::{load_csv, load_sweep};
use nmos_probe::sweep::{Sample, SweepTable};
use nmos_probe::Error;
use std::sync::Arc;

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nmos_probe_{}_{name}", std::process::id()))
}

#[test]
fn test_parquet_round_trip() {
    let table = SweepTable::from_samples(vec![
        Sample::new(5.0, 0.0, 1e-9, 1e-12),
        Sample::new(5.0, 1.0, 2e-6, f64::NAN),
        Sample::new(10.0, 1.0, 4e-6, 3e-12),
    ]);
    let path = scratch_file("round_trip.parquet");
    table.write_parquet(&path).unwrap();

    let loaded = load_sweep(&path, &ExtractionConfig::default()).unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.drain_v(), table.drain_v());
    assert_eq!(loaded.gate_v(), table.gate_v());
    assert_eq!(loaded.drain_i(), table.drain_i());
    assert!(loaded.gate_i()[1].is_nan());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_parquet_with_nullable_columns() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("gate_i", DataType::Float64, true),
        Field::new("drain_v", DataType::Float64, true),
        Field::new("drain_i", DataType::Float64, true),
        Field::new("gate_v", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from(vec![Some(1e-12), None])),
            Arc::new(Float64Array::from(vec![Some(5.0), None])),
            Arc::new(Float64Array::from(vec![Some(1e-6), Some(2e-6)])),
            Arc::new(Float64Array::from(vec![None, Some(1.0)])),
        ],
    )
    .unwrap();

    // Column order does not matter; null drain voltages drop the sample
    let table = SweepTable::from_record_batch(&batch).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.drain_v(), &[5.0]);
    assert!(table.gate_v()[0].is_nan());
}

#[test]
fn test_csv_export_layout() {
    let path = scratch_file("export.csv");
    std::fs::write(
        &path,
        "DrainI,DrainV,GateI,GateV,DrainI,DrainV,GateI,GateV\n\
         1e-9,0.2,1e-12,0,2e-9,5,2e-12,0\n\
         1e-6,0.2,,1,2e-6,5,2e-12,1\n\
         n/a,0.2,0,2,3e-6,5,2e-12,2\n",
    )
    .unwrap();

    let table = load_csv(&path).unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.drain_v(), &[0.2, 5.0, 0.2, 5.0, 5.0]);
    assert!(table.gate_i()[2].is_nan());

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_missing_files_report_reader_errors() {
    let result = load_sweep(scratch_file("missing.csv"), &ExtractionConfig::default());
    assert!(matches!(result, Err(Error::Csv(_))));

    let result = load_sweep(scratch_file("missing.parquet"), &ExtractionConfig::default());
    assert!(matches!(result, Err(Error::StorageError(_))));
}
