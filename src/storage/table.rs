//! Tested-intensity table (Arrow / Parquet)
//!
//! One row per record, one nullable column per run index. Cells past the
//! end of a schedule that stopped early are null.

use crate::schedule::RecordSchedule;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Name of the record identifier column.
pub const RECORD_ID_COLUMN: &str = "record_id";

/// Column name for 1-based run `j`.
#[must_use]
pub fn run_column(j: usize) -> String {
    format!("run_{j}")
}

/// Build the intensity table with `max_runs` run columns.
///
/// # Errors
///
/// Returns error if a schedule has more runs than `max_runs`, or if Arrow
/// rejects the batch.
pub fn intensity_table(schedules: &[RecordSchedule], max_runs: usize) -> Result<RecordBatch> {
    if let Some(over) = schedules.iter().find(|s| s.runs().len() > max_runs) {
        return Err(Error::Storage(format!(
            "record {} has {} runs but the table holds {max_runs}",
            over.record_id(),
            over.runs().len()
        )));
    }

    let mut fields = vec![Field::new(RECORD_ID_COLUMN, DataType::UInt32, false)];
    fields.extend((1..=max_runs).map(|j| Field::new(run_column(j), DataType::Float64, true)));
    let schema = Arc::new(Schema::new(fields));

    let ids: Vec<u32> = schedules.iter().map(RecordSchedule::record_id).collect();
    let mut columns: Vec<ArrayRef> = vec![Arc::new(UInt32Array::from(ids))];
    for j in 0..max_runs {
        let cells: Vec<Option<f64>> = schedules
            .iter()
            .map(|s| s.runs().get(j).map(crate::run::RunResult::intensity))
            .collect();
        columns.push(Arc::new(Float64Array::from(cells)));
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write the intensity table as Parquet.
///
/// # Errors
///
/// Returns error if the file cannot be created or written.
pub fn write_intensity_table<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    let file = File::create(path.as_ref())
        .map_err(|e| Error::Storage(format!("Failed to create Parquet file: {e}")))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Load an intensity table written by [`write_intensity_table`].
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn load_intensity_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path.as_ref())
        .map_err(|e| Error::Storage(format!("Failed to open Parquet file: {e}")))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(arrow::compute::concat_batches(&schema, &batches)?)
}

/// Decode an intensity table into `(record_id, tested intensities)` rows.
///
/// Null cells are dropped, so each row has exactly the record's run count.
///
/// # Errors
///
/// Returns error if the batch does not have the expected column types.
pub fn table_rows(batch: &RecordBatch) -> Result<Vec<(u32, Vec<f64>)>> {
    let ids = batch
        .column_by_name(RECORD_ID_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| Error::Storage(format!("missing UInt32 column '{RECORD_ID_COLUMN}'")))?;

    let runs = batch
        .columns()
        .iter()
        .skip(1)
        .map(|column| {
            column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| Error::Storage("run columns must be Float64".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((0..batch.num_rows())
        .map(|row| {
            let tested = runs
                .iter()
                .filter(|column| !column.is_null(row))
                .map(|column| column.value(row))
                .collect();
            (ids.value(row), tested)
        })
        .collect())
}
