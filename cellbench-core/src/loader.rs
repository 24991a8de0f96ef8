//! Chunked CSV Loading
//!
//! [`CsvSource`] names a measurement file and a chunk size. Each call to
//! [`CsvSource::chunks`] reopens the file and yields [`RowBatch`]es of at most
//! `chunksize` rows in file order, reading lazily as the iterator advances.

use cellbench_ipc::{Measurements, RowBatch};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Identifier column
pub const CELL_ID_COLUMN: &str = "CellId";
/// Nuclear volume column
pub const NUCLEAR_VOLUME_COLUMN: &str = "Nuclear Volume [fL]";
/// Cellular volume column
pub const CELLULAR_VOLUME_COLUMN: &str = "Cellular Volume [fL]";
/// Nuclear surface area column
pub const NUCLEAR_SURFACE_AREA_COLUMN: &str = "Nuclear Surface Area [um^2]";
/// Cellular surface area column
pub const CELLULAR_SURFACE_AREA_COLUMN: &str = "Cellular Surface Area [um^2]";

/// Columns every input file must provide
pub const REQUIRED_COLUMNS: [&str; 5] = [
    CELL_ID_COLUMN,
    NUCLEAR_VOLUME_COLUMN,
    CELLULAR_VOLUME_COLUMN,
    NUCLEAR_SURFACE_AREA_COLUMN,
    CELLULAR_SURFACE_AREA_COLUMN,
];

/// Upper bound on the rows preallocated per batch
const MAX_PREALLOCATED_ROWS: usize = 64 * 1024;

/// Errors raised while reading the measurement file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("chunk size must be a positive integer")]
    InvalidChunkSize,

    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input at {location}: {message}")]
    Parse { location: String, message: String },
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        let location = e
            .position()
            .map(|p| format!("line {}", p.line()))
            .unwrap_or_else(|| "unknown position".to_string());
        LoadError::Parse {
            location,
            message: e.to_string(),
        }
    }
}

/// One CSV record. Empty measurement cells are missing values.
#[derive(Debug, Deserialize)]
struct CellRecord {
    #[serde(rename = "CellId")]
    cell_id: String,
    #[serde(rename = "Nuclear Volume [fL]")]
    nuclear_volume: Option<f64>,
    #[serde(rename = "Cellular Volume [fL]")]
    cellular_volume: Option<f64>,
    #[serde(rename = "Nuclear Surface Area [um^2]")]
    nuclear_surface_area: Option<f64>,
    #[serde(rename = "Cellular Surface Area [um^2]")]
    cellular_surface_area: Option<f64>,
}

impl CellRecord {
    fn measurements(&self) -> Measurements {
        Measurements {
            nuclear_volume: self.nuclear_volume.unwrap_or(f64::NAN),
            cellular_volume: self.cellular_volume.unwrap_or(f64::NAN),
            nuclear_surface_area: self.nuclear_surface_area.unwrap_or(f64::NAN),
            cellular_surface_area: self.cellular_surface_area.unwrap_or(f64::NAN),
        }
    }
}

/// A measurement file read in fixed-size chunks
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    chunksize: usize,
}

impl CsvSource {
    /// Describe a source; `chunksize` must be positive
    pub fn new(path: impl Into<PathBuf>, chunksize: usize) -> Result<Self, LoadError> {
        if chunksize == 0 {
            return Err(LoadError::InvalidChunkSize);
        }
        Ok(Self {
            path: path.into(),
            chunksize,
        })
    }

    /// Path of the measurement file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum rows per chunk
    pub fn chunksize(&self) -> usize {
        self.chunksize
    }

    /// Open the file and start a fresh pass over its chunks
    pub fn chunks(&self) -> Result<ChunkLoader<File>, LoadError> {
        let file = File::open(&self.path).map_err(|source| LoadError::Open {
            path: self.path.clone(),
            source,
        })?;
        ChunkLoader::from_reader(file, self.chunksize)
    }

    /// Read every chunk into memory, in file order
    pub fn load_all(&self) -> Result<Vec<RowBatch>, LoadError> {
        self.chunks()?.collect()
    }
}

/// Lazy, single-pass iterator over the chunks of one reader
pub struct ChunkLoader<R: Read> {
    records: csv::DeserializeRecordsIntoIter<R, CellRecord>,
    chunksize: usize,
    finished: bool,
}

impl<R: Read> ChunkLoader<R> {
    /// Wrap any CSV reader. Fails if a required column is missing.
    pub fn from_reader(reader: R, chunksize: usize) -> Result<Self, LoadError> {
        if chunksize == 0 {
            return Err(LoadError::InvalidChunkSize);
        }

        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?;
        if let Some(missing) = REQUIRED_COLUMNS
            .iter()
            .find(|name| !headers.iter().any(|h| h == **name))
        {
            return Err(LoadError::Parse {
                location: "header".to_string(),
                message: format!("missing required column '{}'", missing),
            });
        }

        Ok(Self {
            records: reader.into_deserialize(),
            chunksize,
            finished: false,
        })
    }
}

impl<R: Read> Iterator for ChunkLoader<R> {
    type Item = Result<RowBatch, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = RowBatch::with_capacity(self.chunksize.min(MAX_PREALLOCATED_ROWS));
        while batch.len() < self.chunksize {
            match self.records.next() {
                Some(Ok(record)) => {
                    let m = record.measurements();
                    batch.push(record.cell_id, m);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "CellId,Nuclear Volume [fL],Cellular Volume [fL],Nuclear Surface Area [um^2],Cellular Surface Area [um^2]\n";

    fn csv_with_rows(n: usize) -> String {
        let mut s = HEADER.to_string();
        for i in 0..n {
            s.push_str(&format!("c{},{}.0,{}.0,50.0,120.0\n", i, 100 + i, 400 + i));
        }
        s
    }

    fn load(text: &str, chunksize: usize) -> Vec<RowBatch> {
        ChunkLoader::from_reader(Cursor::new(text.to_string()), chunksize)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_chunks_in_file_order() {
        let batches = load(&csv_with_rows(7), 3);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batches[0].cell_ids, vec!["c0", "c1", "c2"]);
        assert_eq!(batches[2].cell_ids, vec!["c6"]);
        assert_eq!(batches[1].nuclear_volume, vec![103.0, 104.0, 105.0]);
    }

    #[test]
    fn test_large_chunksize_yields_single_batch() {
        let batches = load(&csv_with_rows(5), 1_000_000);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let batches = load(&csv_with_rows(6), 3);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn test_header_only_yields_nothing() {
        assert!(load(HEADER, 10).is_empty());
    }

    #[test]
    fn test_empty_cells_are_nan_and_extra_columns_ignored() {
        let text = "Extra,CellId,Nuclear Volume [fL],Cellular Volume [fL],Nuclear Surface Area [um^2],Cellular Surface Area [um^2]\n\
                    x,42,,10.0,20.0,30.0\n";
        let batches = load(text, 10);
        assert_eq!(batches[0].cell_ids, vec!["42"]);
        assert!(batches[0].nuclear_volume[0].is_nan());
        assert_eq!(batches[0].cellular_surface_area[0], 30.0);
    }

    #[test]
    fn test_missing_column_rejected() {
        let text = "CellId,Nuclear Volume [fL]\nc1,1.0\n";
        let result = ChunkLoader::from_reader(Cursor::new(text), 10);
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_malformed_row_propagates() {
        let mut text = csv_with_rows(2);
        text.push_str("c9,not-a-number,1.0,1.0,1.0\n");
        let mut loader = ChunkLoader::from_reader(Cursor::new(text), 2).unwrap();
        assert_eq!(loader.next().unwrap().unwrap().len(), 2);
        match loader.next() {
            Some(Err(LoadError::Parse { location, .. })) => assert!(location.starts_with("line")),
            other => panic!("expected parse error, got {:?}", other.map(|r| r.map(|b| b.len()))),
        }
        assert!(loader.next().is_none());
    }

    #[test]
    fn test_zero_chunksize_rejected() {
        assert!(matches!(
            CsvSource::new("cells.csv", 0),
            Err(LoadError::InvalidChunkSize)
        ));
    }

    #[test]
    fn test_missing_file() {
        let source = CsvSource::new("/nonexistent/cells.csv", 10).unwrap();
        assert!(matches!(source.chunks(), Err(LoadError::Open { .. })));
    }

    #[test]
    fn test_source_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cells.csv");
        std::fs::write(&path, csv_with_rows(4)).unwrap();

        let source = CsvSource::new(&path, 3).unwrap();
        let first = source.load_all().unwrap();
        let second = source.load_all().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
