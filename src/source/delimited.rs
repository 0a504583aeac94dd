//! Delimited-text input.
//!
//! Reads query/page rows from a CSV file (or stdin) with a header row.
//! Cells are kept as text; validation happens in the engine.

use crate::models::RawObservation;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Read raw observations from a path, `-` meaning stdin.
pub fn read_observations(path: &Path) -> Result<Vec<RawObservation>> {
    if path == Path::new("-") {
        info!("Reading observations from stdin");
        return read_from(std::io::stdin().lock());
    }

    info!("Reading observations from {}", path.display());
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;

    read_from(file).with_context(|| format!("Failed to read input file: {}", path.display()))
}

/// Read raw observations from any reader.
pub fn read_from<R: Read>(reader: R) -> Result<Vec<RawObservation>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let headers = reader.headers().context("Missing header row")?.clone();
    debug!("Input columns: {:?}", headers);

    let mut rows = Vec::new();
    for (i, record) in reader.deserialize::<RawObservation>().enumerate() {
        let mut row = record.with_context(|| format!("Malformed CSV at data row {}", i + 1))?;
        row.row = i + 1;
        rows.push(row);
    }

    debug!("Read {} rows", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::io::Write;

    #[test]
    fn test_canonical_headers() {
        let data = "query,page,impressions,clicks,position\ncats,/a,100,10,5.0\ncats,/b,100,5,25\n";
        let rows = read_from(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[1].row, 2);
        assert_eq!(rows[1].page.as_deref(), Some("/b"));
        assert_eq!(rows[1].position.as_deref(), Some("25"));
    }

    #[test]
    fn test_search_console_export_headers() {
        let data = "Query,Landing Page,Url Clicks,Impressions,CTR,Average Position\n\
                    cats , /a ,10,100,10%,5.0\n";
        let rows = read_from(data.as_bytes()).unwrap();
        let obs = rows[0].parse().unwrap();

        assert_eq!(obs.query, "cats");
        assert_eq!(obs.page, "/a");
        assert_eq!(obs.clicks, 10);
        assert_eq!(obs.impressions, 100);
        assert_eq!(obs.position, 5.0);
    }

    #[test]
    fn test_missing_column_surfaces_as_schema_error() {
        let data = "query,impressions,clicks,position\ncats,100,10,5.0\n";
        let rows = read_from(data.as_bytes()).unwrap();

        let err = rows[0].parse().unwrap_err();
        assert!(matches!(err, EngineError::Schema { row: 1, field: "page", .. }));
    }

    #[test]
    fn test_empty_cell_is_missing() {
        let data = "query,page,impressions,clicks,position\ncats,/a,,10,5.0\n";
        let rows = read_from(data.as_bytes()).unwrap();
        assert_eq!(rows[0].impressions, None);
    }

    #[test]
    fn test_header_only() {
        let data = "query,page,impressions,clicks,position\n";
        assert!(read_from(data.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_ragged_row_is_an_error() {
        let data = "query,page,impressions,clicks,position\ncats,/a,100\n";
        let err = read_from(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "query,page,impressions,clicks,position").unwrap();
        writeln!(file, "dogs,/x,10,1,3.0").unwrap();

        let rows = read_observations(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].query.as_deref(), Some("dogs"));
    }

    #[test]
    fn test_missing_file() {
        let err = read_observations(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.csv"));
    }
}
