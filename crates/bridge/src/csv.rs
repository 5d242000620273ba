//! Delimited text → Arrow record batches
//!
//! Column names come from the header row; column types are inferred from
//! every row unless `schema_infer_max_records` caps the sample. Empty fields
//! are nulls. A column with no values at all is read as text.

use arrow_array::RecordBatch;
use arrow_csv::ReaderBuilder;
use arrow_csv::reader::Format;
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use serde::Deserialize;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// CSV parsing options
///
/// All fields have defaults matching arrow_csv defaults, except that schema
/// inference looks at the whole file.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter (default: ',')
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Whether the file has a header row (default: true)
    #[serde(default = "default_has_header")]
    pub has_header: bool,

    /// Number of records per batch (default: 8192)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Quote character (default: '"')
    #[serde(default = "default_quote")]
    pub quote: char,

    /// Escape character (default: None)
    #[serde(default)]
    pub escape: Option<char>,

    /// Rows sampled for type inference (default: all)
    #[serde(default)]
    pub schema_infer_max_records: Option<usize>,
}

fn default_delimiter() -> char {
    ','
}
fn default_has_header() -> bool {
    true
}
fn default_batch_size() -> usize {
    8192
}
fn default_quote() -> char {
    '"'
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_header: default_has_header(),
            batch_size: default_batch_size(),
            quote: default_quote(),
            escape: None,
            schema_infer_max_records: None,
        }
    }
}

impl CsvOptions {
    pub fn validate(&self) -> Result<(), String> {
        let chars = [
            ("delimiter", Some(self.delimiter)),
            ("quote", Some(self.quote)),
            ("escape", self.escape),
        ];
        for (name, c) in chars {
            if c.is_some_and(|c| !c.is_ascii()) {
                return Err(format!("csv {name} must be a single ASCII character"));
            }
        }
        if self.batch_size == 0 {
            return Err("csv batch_size must be greater than 0".to_string());
        }
        Ok(())
    }

    fn format(&self) -> Format {
        let mut format = Format::default()
            .with_delimiter(self.delimiter as u8)
            .with_header(self.has_header)
            .with_quote(self.quote as u8);

        if let Some(escape) = self.escape {
            format = format.with_escape(escape as u8);
        }

        format
    }
}

/// A parsed upload held in memory
#[derive(Debug, Clone)]
pub struct CsvTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl CsvTable {
    /// Parse a file from local storage
    pub fn read(path: &Path, options: &CsvOptions) -> Result<Self, ArrowError> {
        let io_err = |e| ArrowError::IoError(format!("reading {}", path.display()), e);
        let mut file = File::open(path).map_err(io_err)?;

        let format = options.format();
        let (inferred, _) = format.infer_schema(&mut file, options.schema_infer_max_records)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;

        let schema = Arc::new(text_for_null_columns(&inferred));
        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(options.batch_size)
            .build(file)?;

        let mut batches = reader.collect::<Result<Vec<_>, _>>()?;
        if batches.is_empty() {
            // Keep the header's columns even with no data rows
            batches.push(RecordBatch::new_empty(schema.clone()));
        }

        Ok(Self { schema, batches })
    }

    pub fn from_batches(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }
}

fn text_for_null_columns(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| match field.data_type() {
            DataType::Null => Field::new(field.name(), DataType::Utf8, true),
            _ => field.as_ref().clone(),
        })
        .collect();
    Schema::new(fields)
}
