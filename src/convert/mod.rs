//! Spreadsheet to CSV conversion
//!
//! Reads the first sheet of a workbook (or an existing CSV file) and writes
//! it back out as RFC 4180 CSV with CRLF record terminators. Line breaks
//! inside cells are replaced so that one logical row is always one line,
//! which keeps row counting trivial for the progress estimator.

mod cell;

pub use cell::{cell_to_string, normalize_line_breaks, LINE_BREAK_REPLACEMENT};

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Reader};
use serde::Serialize;

use crate::common::{paths, Error, Result};

/// Extensions read through calamine
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Summary of a finished conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    /// Written CSV file
    pub output: PathBuf,
    /// Number of header columns
    pub columns: usize,
    /// Number of rows after the header
    pub data_rows: usize,
}

/// Convert `source` into a CSV file at `dest`, overwriting it
pub fn convert(source: &Path, dest: &Path) -> Result<Conversion> {
    let rows = read_rows(source)?;

    paths::ensure_parent(dest)?;
    let file = File::create(dest)?;
    let (columns, data_rows) = write_rows(rows, file)?;

    tracing::debug!(
        source = %source.display(),
        dest = %dest.display(),
        columns,
        data_rows,
        "Converted iteration data"
    );

    Ok(Conversion {
        output: dest.to_path_buf(),
        columns,
        data_rows,
    })
}

/// Write rows as CSV, the first row being the header
///
/// Returns the header width and the number of data rows.
pub fn write_rows<I, W>(rows: I, writer: W) -> Result<(usize, usize)>
where
    I: IntoIterator<Item = Vec<String>>,
    W: Write,
{
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .flexible(true)
        .from_writer(writer);

    let mut columns = 0;
    let mut written = 0usize;
    for row in rows {
        if written == 0 {
            columns = row.len();
        }
        for field in &row {
            wtr.write_field(normalize_line_breaks(field).as_bytes())?;
        }
        wtr.write_record(None::<&[u8]>)?;
        written += 1;
    }
    wtr.flush()?;

    Ok((columns, written.saturating_sub(1)))
}

fn read_rows(source: &Path) -> Result<Vec<Vec<String>>> {
    if !source.is_file() {
        return Err(Error::file_format(source, "file not found"));
    }
    if !is_supported(source) {
        return Err(Error::file_format(source, "unsupported file type"));
    }

    if has_extension(source, "csv") {
        read_csv_rows(source)
    } else {
        read_sheet_rows(source)
    }
}

/// First sheet of a workbook, every cell rendered as text
fn read_sheet_rows(source: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(source).map_err(|e| Error::file_format(source, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::file_format(source, "workbook contains no sheets"))?
        .map_err(|e| Error::file_format(source, e))?;

    Ok(range
        .rows()
        .map(|r| r.iter().map(cell_to_string).collect())
        .collect())
}

fn read_csv_rows(source: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(source)
        .map_err(|e| Error::file_format(source, e))?;

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| Error::file_format(source, e))
        })
        .collect()
}

/// Case-insensitive extension check
fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Whether `path` names a file the converter can read
pub fn is_supported(path: &Path) -> bool {
    has_extension(path, "csv") || SPREADSHEET_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Data;

    fn render(rows: Vec<Vec<Data>>) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(cell_to_string).collect())
            .collect()
    }

    fn write_to_string(rows: Vec<Vec<String>>) -> (String, usize, usize) {
        let mut buf = Vec::new();
        let (columns, data_rows) = write_rows(rows, &mut buf).unwrap();
        (String::from_utf8(buf).unwrap(), columns, data_rows)
    }

    #[test]
    fn test_multiline_cell_scenario() {
        let rows = render(vec![
            vec![Data::String("Name".into()), Data::String("Value".into())],
            vec![Data::String("a\nb".into()), Data::String("x".into())],
        ]);
        let (csv, columns, data_rows) = write_to_string(rows);
        assert_eq!(csv, "Name,Value\r\na|b,x\r\n");
        assert_eq!(columns, 2);
        assert_eq!(data_rows, 1);
    }

    #[test]
    fn test_non_string_cells() {
        let rows = render(vec![
            vec![
                Data::String("id".into()),
                Data::String("amount".into()),
                Data::String("active".into()),
                Data::String("note".into()),
            ],
            vec![Data::Int(7), Data::Float(12.5), Data::Bool(false), Data::Empty],
        ]);
        let (csv, _, _) = write_to_string(rows);
        assert_eq!(csv, "id,amount,active,note\r\n7,12.5,false,\r\n");
    }

    #[test]
    fn test_line_count_is_rows_plus_header() {
        let mut rows = vec![vec!["h1".to_string(), "h2".to_string()]];
        for i in 0..25 {
            rows.push(vec![format!("line {i}\nmore\r\nend"), "v".to_string()]);
        }
        let (csv, _, data_rows) = write_to_string(rows);
        assert_eq!(data_rows, 25);
        assert_eq!(csv.lines().count(), 26);
        assert_eq!(csv.matches("\r\n").count(), 26);
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let rows = vec![
            vec!["body".to_string()],
            vec!["{\"a\": 1, \"b\": \"x\"}".to_string()],
        ];
        let (csv, _, _) = write_to_string(rows);
        assert_eq!(csv, "body\r\n\"{\"\"a\"\": 1, \"\"b\"\": \"\"x\"\"}\"\r\n");
    }

    #[test]
    fn test_csv_source_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cases.csv");
        std::fs::write(&source, "Name,Value\n\"multi\nline\",1\nplain,2\n").unwrap();
        let dest = dir.path().join("out").join("cases.csv");

        let conversion = convert(&source, &dest).unwrap();
        assert_eq!(conversion.data_rows, 2);
        assert_eq!(conversion.columns, 2);
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "Name,Value\r\nmulti|line,1\r\nplain,2\r\n"
        );
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[test]
    fn test_workbook_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cases.csv");

        let conversion = convert(&fixture("cases.xlsx"), &dest).unwrap();

        // Row 3 is blank in the sheet and still becomes an (empty) iteration
        let csv = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(csv, "Name,Value\r\na|b,3\r\n,\r\nc,12.5\r\n");
        assert_eq!(conversion.columns, 2);
        assert_eq!(conversion.data_rows, 3);
        assert_eq!(csv.lines().count(), conversion.data_rows + 1);
    }

    #[test]
    fn test_destination_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.csv");
        let dest = dir.path().join("out.csv");
        std::fs::write(&source, "a\n1\n").unwrap();
        std::fs::write(&dest, "stale content that is longer than the new one\n").unwrap();

        convert(&source, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "a\r\n1\r\n");
    }

    #[test]
    fn test_corrupt_workbook_is_file_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.xlsx");
        std::fs::write(&source, b"this is not a zip archive").unwrap();

        let err = convert(&source, &dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, Error::FileFormat { .. }), "{err:?}");
    }

    #[test]
    fn test_unknown_extension_is_file_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, "hello").unwrap();

        let err = convert(&source, &dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, Error::FileFormat { .. }), "{err:?}");
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_missing_source_is_file_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert(&dir.path().join("absent.xlsx"), &dir.path().join("o.csv")).unwrap_err();
        assert!(matches!(err, Error::FileFormat { .. }));
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("data/Cases.XLSX")));
        assert!(is_supported(Path::new("cases.ods")));
        assert!(is_supported(Path::new("cases.csv")));
        assert!(!is_supported(Path::new("cases.json")));
    }
}
