//! Report writers (CSV, Parquet, JSON)
//!
//! Undefined values are written as empty CSV cells and as Parquet nulls.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, RecordBatch, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;

use super::{BatchReport, SummaryRow};
use crate::{Error, Result};

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => v.to_string(),
        _ => String::new(),
    }
}

fn defined(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

/// Write the summary table as CSV
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_summary_csv<P: AsRef<Path>>(report: &BatchReport, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(report.summary_columns())?;

    for row in report.summary_rows() {
        let mut record = vec![
            row.chip.to_string(),
            row.nmos.to_string(),
            row.pattern.to_string(),
            row.fet_size,
            row.filename,
        ];
        record.extend(row.vth.iter().map(|&v| cell(v)));
        record.extend(
            [row.vd_ref, row.ion, row.ioff, row.ron, row.roff, row.ratio]
                .into_iter()
                .map(cell),
        );
        record.push(row.status);
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the per-gate table as CSV
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_per_gate_csv<P: AsRef<Path>>(report: &BatchReport, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "chip",
        "fet_size",
        "GateV_V",
        "DrainI_at_Vd_A",
        "R_at_Vd_ohm",
        "GateI_at_Vd_A",
    ])?;

    for row in report.per_gate_rows() {
        writer.write_record([
            row.chip.to_string(),
            row.fet_size,
            cell(Some(row.gate_v)),
            cell(Some(row.drain_i)),
            cell(Some(row.resistance)),
            cell(Some(row.gate_i)),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Summary table as an Arrow record batch
///
/// # Errors
/// Returns error if the batch cannot be assembled
pub fn summary_record_batch(report: &BatchReport) -> Result<RecordBatch> {
    let rows = report.summary_rows();
    let names = report.summary_columns();

    let mut fields = Vec::with_capacity(names.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(names.len());
    let mut push = |name: &str, data_type: DataType, nullable: bool, array: ArrayRef| {
        fields.push(Field::new(name, data_type, nullable));
        columns.push(array);
    };

    let ids: [fn(&SummaryRow) -> u32; 3] = [|r| r.chip, |r| r.nmos, |r| r.pattern];
    for (k, get) in ids.iter().enumerate() {
        let values = UInt32Array::from_iter_values(rows.iter().map(get));
        push(&names[k], DataType::UInt32, false, Arc::new(values));
    }
    let fet_size = StringArray::from_iter_values(rows.iter().map(|r| r.fet_size.as_str()));
    push(&names[3], DataType::Utf8, false, Arc::new(fet_size));
    let filename = StringArray::from_iter_values(rows.iter().map(|r| r.filename.as_str()));
    push(&names[4], DataType::Utf8, false, Arc::new(filename));

    let n_vth = rows.first().map_or(names.len() - 12, |r| r.vth.len());
    for k in 0..n_vth {
        let values: Float64Array = rows.iter().map(|r| r.vth[k].and_then(defined)).collect();
        push(&names[5 + k], DataType::Float64, true, Arc::new(values));
    }

    let scalars: [fn(&SummaryRow) -> Option<f64>; 6] = [
        |r| r.vd_ref,
        |r| r.ion,
        |r| r.ioff,
        |r| r.ron,
        |r| r.roff,
        |r| r.ratio,
    ];
    for (offset, get) in scalars.iter().enumerate() {
        let values: Float64Array = rows.iter().map(get).collect();
        push(&names[5 + n_vth + offset], DataType::Float64, true, Arc::new(values));
    }
    push(
        &names[names.len() - 1],
        DataType::Utf8,
        false,
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.status.as_str()))),
    );

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .map_err(|e| Error::StorageError(format!("Failed to create summary batch: {e}")))
}

/// Per-gate table as an Arrow record batch
///
/// # Errors
/// Returns error if the batch cannot be assembled
pub fn per_gate_record_batch(report: &BatchReport) -> Result<RecordBatch> {
    let rows = report.per_gate_rows();
    let schema = Schema::new(vec![
        Field::new("chip", DataType::UInt32, false),
        Field::new("fet_size", DataType::Utf8, false),
        Field::new("GateV_V", DataType::Float64, false),
        Field::new("DrainI_at_Vd_A", DataType::Float64, false),
        Field::new("R_at_Vd_ohm", DataType::Float64, false),
        Field::new("GateI_at_Vd_A", DataType::Float64, true),
    ]);

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.chip))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.fet_size.as_str()))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.gate_v))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.drain_i))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.resistance))),
        Arc::new(rows.iter().map(|r| defined(r.gate_i)).collect::<Float64Array>()),
    ];

    RecordBatch::try_new(Arc::new(schema), columns)
        .map_err(|e| Error::StorageError(format!("Failed to create per-gate batch: {e}")))
}

/// Write a record batch to a Parquet file
///
/// # Errors
/// Returns error if the file cannot be created or written
pub fn write_record_batch_parquet<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Write all device records as pretty-printed JSON
///
/// Non-finite numbers are written as `null`.
///
/// # Errors
/// Returns error if the file cannot be written
pub fn write_json<P: AsRef<Path>>(report: &BatchReport, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, report.records())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::extract::{extract_device, DeviceId, MetricsRecord};
    use crate::sweep::{Sample, SweepTable};
    use arrow::array::Array;

    fn report() -> BatchReport {
        let table = SweepTable::from_samples(
            [0.0, 1.0, 2.0]
                .into_iter()
                .map(|vg| Sample::new(5.0, vg, 1e-6 * vg, f64::NAN)),
        );
        let config = ExtractionConfig::default();
        BatchReport::new(
            vec![
                extract_device(DeviceId::new(5, 1, 1, "nmos5 pattern1 chip1.csv"), &table, &config),
                MetricsRecord::load_failed(
                    DeviceId::new(5, 1, 2, "nmos5 pattern1 chip2.xls"),
                    &config.reference_biases,
                    "corrupt",
                ),
            ],
            config.reference_biases,
        )
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(cell(None), "");
        assert_eq!(cell(Some(f64::NAN)), "");
        assert_eq!(cell(Some(f64::INFINITY)), "inf");
        assert_eq!(cell(Some(0.5)), "0.5");
    }

    #[test]
    fn test_summary_record_batch_shape_and_nulls() {
        let batch = summary_record_batch(&report()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 16);
        assert_eq!(batch.schema().field(5).name(), "Vth_Vd200mV");

        let ion = batch
            .column_by_name("Ion_A")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!(ion.is_valid(0));
        assert!(ion.is_null(1));
    }

    #[test]
    fn test_summary_record_batch_empty_report() {
        let report = BatchReport::new(Vec::new(), vec![0.2, 1.0, 5.0, 10.0]);
        let batch = summary_record_batch(&report).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 16);
    }

    #[test]
    fn test_per_gate_record_batch_nulls_missing_gate_current() {
        let batch = per_gate_record_batch(&report()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert!(batch.column(5).is_null(0));
    }
}
