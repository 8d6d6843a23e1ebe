//! Sweep table loading
//!
//! Probe-station exports store several concurrently recorded curves side by
//! side. After one header row, every data row repeats four-cell groups:
//!
//! ```text
//! | DrainI | DrainV | GateI | GateV | DrainI | DrainV | GateI | GateV | ...
//! ```
//!
//! A group becomes a sample only when both drain cells are numeric; gate
//! cells that are not numeric become NaN.
//!
//! Supported inputs:
//! - `.xls` / `.xlsx` workbooks (feature `xls`), worksheet from configuration
//! - `.csv` with the same column layout
//! - `.parquet` holding a flattened sweep table (see [`SweepTable::write_parquet`])

use std::path::Path;

use tracing::debug;

use crate::config::ExtractionConfig;
use crate::sweep::{Sample, SweepTable};
use crate::{Error, Result};

/// Cells per curve group
pub const GROUP_WIDTH: usize = 4;

/// One spreadsheet cell, reduced to what extraction needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    /// Integer or floating-point value
    Number(f64),
    /// Text, boolean, error, or empty cell
    Blank,
}

impl Cell {
    fn number(self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(v),
            Self::Blank => None,
        }
    }
}

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Excel workbook (`.xls`, `.xlsx`)
    Workbook,
    /// Comma-separated values
    Csv,
    /// Flattened Parquet sweep table
    Parquet,
}

impl SourceFormat {
    /// Detect the format from the file extension (case-insensitive)
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xls" | "xlsx" => Some(Self::Workbook),
            "csv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }
}

/// Decode header + data rows into a sweep table
///
/// The number of curve groups is `header.len() / 4`. A row shorter than a
/// group stops that row.
#[must_use]
pub fn decode_rows<I, R>(rows: I) -> SweepTable
where
    I: IntoIterator<Item = R>,
    R: AsRef<[Cell]>,
{
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return SweepTable::empty();
    };
    let n_curves = header.as_ref().len() / GROUP_WIDTH;

    let mut samples = Vec::new();
    for row in rows {
        let row = row.as_ref();
        for k in 0..n_curves {
            let i = k * GROUP_WIDTH;
            if i + GROUP_WIDTH > row.len() {
                break;
            }
            let (Some(drain_i), Some(drain_v)) = (row[i].number(), row[i + 1].number()) else {
                continue;
            };
            samples.push(Sample::new(
                drain_v,
                row[i + 3].number().unwrap_or(f64::NAN),
                drain_i,
                row[i + 2].number().unwrap_or(f64::NAN),
            ));
        }
    }
    SweepTable::from_samples(samples)
}

/// Load the sweep table of one device file
///
/// # Errors
/// Returns error if the format is unknown or unsupported in this build, or
/// the file cannot be read
pub fn load_sweep<P: AsRef<Path>>(path: P, config: &ExtractionConfig) -> Result<SweepTable> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;

    let table = match format {
        SourceFormat::Workbook => load_workbook(path, &config.sheet_name)?,
        SourceFormat::Csv => load_csv(path)?,
        SourceFormat::Parquet => SweepTable::load_parquet(path)?,
    };
    debug!(path = %path.display(), samples = table.len(), "loaded sweep table");
    Ok(table)
}

/// Load a CSV export
///
/// # Errors
/// Returns error if the file cannot be opened or a record cannot be read
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<SweepTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_ref())?;

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| field.trim().parse::<f64>().map_or(Cell::Blank, Cell::Number))
                .collect(),
        );
    }
    Ok(decode_rows(rows))
}

/// Load one worksheet of an Excel workbook
///
/// # Errors
/// Returns `Spreadsheet` if the workbook or worksheet cannot be read
#[cfg(feature = "xls")]
pub fn load_workbook<P: AsRef<Path>>(path: P, sheet_name: &str) -> Result<SweepTable> {
    use calamine::{open_workbook_auto, Reader};

    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        Error::Spreadsheet(format!("Failed to open workbook {}: {e}", path.display()))
    })?;
    let range = workbook.worksheet_range(sheet_name).map_err(|e| {
        Error::Spreadsheet(format!("Failed to read worksheet '{sheet_name}': {e}"))
    })?;

    Ok(decode_rows(anchored_rows(&range)))
}

/// Map one workbook cell; dates keep their serial-day value
#[cfg(feature = "xls")]
#[allow(clippy::cast_precision_loss)]
fn workbook_cell(data: &calamine::Data) -> Cell {
    use calamine::Data;

    match data {
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        _ => Cell::Blank,
    }
}

/// Worksheet rows positioned from A1
///
/// calamine trims a range to its first used cell, so leading blank rows and
/// columns are restored before the four-cell groups are split.
#[cfg(feature = "xls")]
fn anchored_rows(range: &calamine::Range<calamine::Data>) -> Vec<Vec<Cell>> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let (_, width) = range.get_size();
    let lead = first_col as usize;

    let mut rows = vec![vec![Cell::Blank; lead + width]; first_row as usize];
    rows.extend(range.rows().map(|row| {
        std::iter::repeat(Cell::Blank)
            .take(lead)
            .chain(row.iter().map(workbook_cell))
            .collect::<Vec<_>>()
    }));
    rows
}

/// Workbook reading is not compiled in
///
/// # Errors
/// Always returns `UnsupportedFormat`
#[cfg(not(feature = "xls"))]
pub fn load_workbook<P: AsRef<Path>>(path: P, _sheet_name: &str) -> Result<SweepTable> {
    Err(Error::UnsupportedFormat(path.as_ref().to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use Cell::{Blank, Number};

    #[test]
    fn test_decode_rows_splits_curve_groups() {
        let rows = vec![
            vec![Blank; 8],
            vec![
                Number(1e-6), Number(5.0), Number(1e-12), Number(2.0),
                Number(2e-6), Number(5.0), Number(2e-12), Number(3.0),
            ],
        ];
        let table = decode_rows(rows);
        assert_eq!(table.len(), 2);
        assert_eq!(table.drain_v(), &[5.0, 5.0]);
        assert_eq!(table.gate_v(), &[2.0, 3.0]);
        assert_eq!(table.drain_i(), &[1e-6, 2e-6]);
        assert_eq!(table.gate_i(), &[1e-12, 2e-12]);
    }

    #[test]
    fn test_decode_rows_skips_non_numeric_drain_cells() {
        let rows = vec![
            vec![Blank; 4],
            vec![Blank, Number(5.0), Number(0.0), Number(1.0)],
            vec![Number(1e-6), Blank, Number(0.0), Number(1.0)],
            vec![Number(1e-6), Number(5.0), Blank, Blank],
        ];
        let table = decode_rows(rows);
        assert_eq!(table.len(), 1);
        assert!(table.gate_v()[0].is_nan());
        assert!(table.gate_i()[0].is_nan());
    }

    #[test]
    fn test_decode_rows_ignores_partial_trailing_group() {
        let rows = vec![
            vec![Blank; 6],
            vec![Number(1e-6), Number(5.0), Number(0.0), Number(1.0), Number(9.0), Number(9.0)],
            vec![Number(1e-6), Number(5.0)],
        ];
        let table = decode_rows(rows);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_decode_rows_header_only_is_empty() {
        assert!(decode_rows(vec![vec![Blank; 4]]).is_empty());
        assert!(decode_rows(Vec::<Vec<Cell>>::new()).is_empty());
    }

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a.XLS")), Some(SourceFormat::Workbook));
        assert_eq!(SourceFormat::from_path(Path::new("a.xlsx")), Some(SourceFormat::Workbook));
        assert_eq!(SourceFormat::from_path(Path::new("a.csv")), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_path(Path::new("a.parquet")), Some(SourceFormat::Parquet));
        assert_eq!(SourceFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), None);
    }

    #[cfg(feature = "xls")]
    #[test]
    fn test_anchored_rows_restore_leading_blank_column() {
        use calamine::{Data, Range};

        // Header on row 1, data on row 2, first used column is B
        let mut range: Range<Data> = Range::new((0, 1), (1, 4));
        for col in 1..=4 {
            range.set_value((0, col), Data::String("h".to_string()));
        }
        range.set_value((1, 1), Data::Float(1e-6));
        range.set_value((1, 2), Data::Float(5.0));
        range.set_value((1, 3), Data::Float(1e-12));
        range.set_value((1, 4), Data::Int(2));

        let rows = anchored_rows(&range);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].len(), 5);
        assert_eq!(rows[1][0], Blank);
        assert_eq!(rows[1][1], Number(1e-6));
        assert_eq!(rows[1][4], Number(2.0));

        // The only group spans A..D, and its blank drain current drops the row
        assert!(decode_rows(rows).is_empty());
    }

    #[cfg(feature = "xls")]
    #[test]
    fn test_anchored_rows_restore_leading_blank_row() {
        use calamine::{Data, Range};

        // Row 1 is empty, so both used rows are data
        let mut range: Range<Data> = Range::new((1, 0), (2, 3));
        for col in 0..4 {
            range.set_value((1, col), Data::Float(f64::from(col) + 1.0));
            range.set_value((2, col), Data::Float(f64::from(col) + 11.0));
        }

        let rows = anchored_rows(&range);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![Blank; 4]);

        let table = decode_rows(rows);
        assert_eq!(table.len(), 2);
        assert_eq!(table.drain_i(), &[1.0, 11.0]);
        assert_eq!(table.drain_v(), &[2.0, 12.0]);
        assert_eq!(table.gate_v(), &[4.0, 14.0]);
    }

    #[cfg(feature = "xls")]
    #[test]
    fn test_workbook_cell_mapping() {
        use calamine::{Data, ExcelDateTime, ExcelDateTimeType};

        assert_eq!(workbook_cell(&Data::Float(2.5)), Number(2.5));
        assert_eq!(workbook_cell(&Data::Int(-3)), Number(-3.0));
        let date = ExcelDateTime::new(45_000.5, ExcelDateTimeType::DateTime, false);
        assert_eq!(workbook_cell(&Data::DateTime(date)), Number(45_000.5));
        assert_eq!(workbook_cell(&Data::String("1.0".to_string())), Blank);
        assert_eq!(workbook_cell(&Data::Bool(true)), Blank);
        assert_eq!(workbook_cell(&Data::Empty), Blank);
    }

    #[test]
    fn test_load_sweep_unknown_extension() {
        let result = load_sweep("device.txt", &ExtractionConfig::default());
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }
}
