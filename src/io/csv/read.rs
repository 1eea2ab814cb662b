//! CSV reading operations.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{CsvReadOptions, CsvReader, DataType, Field, Schema, SchemaRef}};

/// Read a table whose `key` column must stay textual (leading zeros preserved).
pub(crate) fn read_table_csv(path: &Path, key: &str) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[io::csv::read] Failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .with_options(CsvReadOptions::default().with_schema_overwrite(Some(key_schema(key))))
        .finish()
        .with_context(|| format!("[io::csv::read] Failed to read CSV from {:?}", path))
}

fn key_schema(key: &str) -> SchemaRef {
    Arc::new(Schema::from_iter([Field::new(key.into(), DataType::String)]))
}
