//! Batch driver integration tests

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use nmos_probe::config::ExtractionConfig;
use nmos_probe::extract::ExtractionStatus;
use nmos_probe::report::{
    collect_device_files, per_gate_record_batch, run_batch, summary_record_batch, write_json,
    write_per_gate_csv, write_record_batch_parquet, write_summary_csv,
};
use nmos_probe::Error;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nmos_probe_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Probe-station layout: two curve groups per row (drain 1 V and 5 V)
fn write_device_csv(path: &Path, vth: f64) {
    let mut text = String::from("DrainI,DrainV,GateI,GateV,DrainI,DrainV,GateI,GateV\n");
    for vg in 0..=6 {
        let vg = f64::from(vg);
        let id = if vg >= vth { 1e-5 * (vg - vth) } else { 0.0 };
        writeln!(text, "{id},1,1e-12,{vg},{},5,2e-12,{vg}", id * 2.0).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

#[test]
fn test_batch_skips_unparseable_names() {
    let dir = scratch_dir("batch_csv");
    write_device_csv(&dir.join("nmos5 pattern1 chip1.csv"), 2.0);
    write_device_csv(&dir.join("nmos5 pattern1 chip2.csv"), 3.0);
    write_device_csv(&dir.join("badname.csv"), 1.0);

    let report = run_batch(&dir, &ExtractionConfig::default()).unwrap();
    assert_eq!(report.len(), 2);

    let chips: Vec<u32> = report.records().iter().map(|r| r.device.chip).collect();
    assert_eq!(chips, vec![1, 2]);
    assert!(report.records().iter().all(|r| r.status == ExtractionStatus::Ok));

    let vth = report.records()[1].vth_at(5.0).unwrap();
    assert!((vth - 3.0).abs() < 1e-9);

    std::fs::remove_dir_all(&dir).ok();
}

#[cfg(feature = "xls")]
#[test]
fn test_batch_isolates_unreadable_workbooks() {
    let dir = scratch_dir("batch_xls");
    for name in ["nmos5 pattern1 chip1.xls", "nmos5 pattern1 chip2.xls", "badname.xls"] {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    assert_eq!(collect_device_files(&dir).unwrap().len(), 2);

    let report = run_batch(&dir, &ExtractionConfig::default()).unwrap();
    assert_eq!(report.len(), 2);
    for record in report.records() {
        assert!(matches!(record.status, ExtractionStatus::LoadFailed(_)));
        assert!(record.on_off.is_none());
        assert_eq!(record.thresholds.len(), 4);
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_batch_without_device_files_fails() {
    let dir = scratch_dir("batch_empty");
    std::fs::write(dir.join("notes.txt"), "nothing here").unwrap();

    let result = run_batch(&dir, &ExtractionConfig::default());
    assert!(matches!(result, Err(Error::NoDeviceFiles(_))));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_collect_ignores_unsupported_extensions() {
    let dir = scratch_dir("batch_collect");
    write_device_csv(&dir.join("nmos5 pattern1 chip1.csv"), 2.0);
    std::fs::write(dir.join("nmos5 pattern1 chip2.txt"), "x").unwrap();
    std::fs::create_dir_all(dir.join("nmos5 pattern1 chip3.csv")).unwrap();

    let files = collect_device_files(&dir).unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("nmos5 pattern1 chip1.csv"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_report_writers() {
    let dir = scratch_dir("batch_writers");
    write_device_csv(&dir.join("nmos10 pattern2 chip1.csv"), 2.0);
    write_device_csv(&dir.join("nmos5 pattern1 chip1.csv"), 2.5);
    let report = run_batch(&dir, &ExtractionConfig::default()).unwrap();

    let summary = dir.join("nmos_summary.csv");
    write_summary_csv(&report, &summary).unwrap();
    let text = std::fs::read_to_string(&summary).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "chip,nmos,pattern,fet_size,filename,Vth_Vd200mV,Vth_Vd1V,Vth_Vd5V,Vth_Vd10V,\
         Vd_ref_V,Ion_A,Ioff_A,Ron_ohm,Roff_ohm,Ion_Ioff_ratio,status"
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("1,5,1,nmos5_pattern1,nmos5 pattern1 chip1.csv,"));
    assert!(first.ends_with(",inf,ok"));
    assert_eq!(lines.count(), 1);

    let per_gate = dir.join("nmos_summary_per_gate_voltage.csv");
    write_per_gate_csv(&report, &per_gate).unwrap();
    let text = std::fs::read_to_string(&per_gate).unwrap();
    assert_eq!(text.lines().count(), 1 + 2 * 7);
    assert!(text.lines().nth(1).unwrap().starts_with("1,nmos10_pattern2,0,"));

    let parquet = dir.join("nmos_summary.parquet");
    write_record_batch_parquet(&summary_record_batch(&report).unwrap(), &parquet).unwrap();
    write_record_batch_parquet(&per_gate_record_batch(&report).unwrap(), dir.join("pg.parquet"))
        .unwrap();
    assert!(std::fs::metadata(&parquet).unwrap().len() > 0);

    let json = dir.join("records.json");
    write_json(&report, &json).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 2);
    assert_eq!(value[0]["device"]["label"], "nmos5_pattern1");

    std::fs::remove_dir_all(&dir).ok();
}
