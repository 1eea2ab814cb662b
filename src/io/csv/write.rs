//! CSV writing operations.

use std::path::Path;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::CsvWriter};

use crate::io::atomic::PendingWrite;

/// Replace the CSV file at `path` atomically; readers never see a partial table.
pub(crate) fn write_table_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut sink = PendingWrite::open(path)?;
    CsvWriter::new(&mut sink)
        .finish(df)
        .with_context(|| format!("[io::csv::write] Failed to write CSV to {:?}", path))?;
    sink.finalize()
}
