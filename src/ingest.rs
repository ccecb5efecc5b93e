use crate::error::ParseError;
use crate::table::{RawTable, Tabular};
use log::info;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

/// Rows scanned to infer column types.
pub const INFER_SCHEMA_ROWS: usize = 10_000;

/// Markers read as missing, besides the empty field.
pub const MISSING_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA",
];

pub fn read_csv_path(path: &Path) -> Result<RawTable, ParseError> {
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_bytes(&bytes)
}

pub fn read_csv_bytes(bytes: &[u8]) -> Result<RawTable, ParseError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::Empty);
    }
    let null_values = MISSING_MARKERS.iter().map(|m| m.to_string()).collect();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_parse_options(
            CsvParseOptions::default().with_null_values(Some(NullValues::AllColumns(null_values))),
        )
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()?;
    if df.width() == 0 {
        return Err(ParseError::NoColumns);
    }
    let table = RawTable::new(df);
    let (rows, cols) = table.shape();
    info!("loaded table with {rows} rows and {cols} columns");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnKind;

    #[test]
    fn infers_column_kinds() {
        let csv = b"age,city,height\n30,Paris,1.8\n41,Rome,1.65\n";
        let table = read_csv_bytes(csv).unwrap();
        assert_eq!(table.shape(), (2, 3));
        assert_eq!(table.kind_of("age"), Some(ColumnKind::Numeric));
        assert_eq!(table.kind_of("city"), Some(ColumnKind::NonNumeric));
        assert_eq!(table.kind_of("height"), Some(ColumnKind::Numeric));
    }

    #[test]
    fn missing_markers_become_nulls() {
        let csv = b"age,city\n30,NA\n,Rome\nNaN,\n";
        let table = read_csv_bytes(csv).unwrap();
        assert_eq!(table.kind_of("age"), Some(ColumnKind::Numeric));
        assert_eq!(table.missing_count("age").unwrap(), 2);
        assert_eq!(table.missing_count("city").unwrap(), 2);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(read_csv_bytes(b""), Err(ParseError::Empty)));
        assert!(matches!(read_csv_bytes(b"  \n"), Err(ParseError::Empty)));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let csv = b"a,b\n1,2\n3,4,5,6\n";
        assert!(read_csv_bytes(csv).is_err());
    }

    #[test]
    fn reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "x,y\n1,2\n3,4\n").unwrap();
        let table = read_csv_path(&path).unwrap();
        assert_eq!(table.numeric_columns(), vec!["x", "y"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_csv_path(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
