//! Parquet I/O for a rank's edge slice
//!
//! Based on `DuckDB` (Raasveldt et al., SIGMOD 2019) columnar storage patterns.
//!
//! # Format
//!
//! One file per rank, `{path}`, with columns:
//! - `src`: `UInt64`, source global id
//! - `dst`: `UInt64`, destination global id (owned by the rank)
//! - `weight`: `Float32`, nullable; all-null for unweighted slices

use super::LocalGraph;
use crate::types::VertexId;
use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, Float32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

impl<V: VertexId> LocalGraph<V> {
    /// Write the edge slice to a Parquet file
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let mut sources = Vec::with_capacity(self.num_edges());
        let mut targets = Vec::with_capacity(self.num_edges());
        let mut weights = Vec::with_capacity(self.num_edges());
        for (src, dst, weight) in self.iter_edges() {
            sources.push(src.as_u64());
            targets.push(dst.as_u64());
            weights.push(weight);
        }

        let schema = Arc::new(Schema::new(vec![
            Field::new("src", DataType::UInt64, false),
            Field::new("dst", DataType::UInt64, false),
            Field::new("weight", DataType::Float32, true),
        ]));

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(UInt64Array::from(sources)),
                Arc::new(UInt64Array::from(targets)),
                Arc::new(Float32Array::from(weights)),
            ],
        )
        .context("Failed to create RecordBatch")?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::ZSTD(
                parquet::basic::ZstdLevel::try_new(3)?,
            ))
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }

    /// Read an edge slice written by [`write_parquet`](Self::write_parquet)
    ///
    /// A slice is weighted when every row carries a weight; partially null
    /// weight columns are rejected.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, a column has the wrong type, or
    /// an id does not fit the vertex id type
    #[allow(clippy::unused_async)] // Async API for future I/O operations
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut src_ids = Vec::new();
        let mut dst_ids = Vec::new();
        let mut weights = Vec::new();
        let mut null_weights = 0_usize;

        for batch_result in reader {
            let batch: RecordBatch = batch_result?;

            let sources = batch
                .column(0)
                .as_any()
                .downcast_ref::<UInt64Array>()
                .context("Invalid src column type")?;

            let targets = batch
                .column(1)
                .as_any()
                .downcast_ref::<UInt64Array>()
                .context("Invalid dst column type")?;

            let batch_weights = batch
                .column(2)
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Invalid weight column type")?;

            null_weights += batch_weights.null_count();

            for i in 0..batch.num_rows() {
                src_ids.push(to_vertex::<V>(sources.value(i))?);
                dst_ids.push(to_vertex::<V>(targets.value(i))?);
                weights.push(batch_weights.value(i));
            }
        }

        let weights = match null_weights {
            0 if !weights.is_empty() => Some(weights),
            n if n == weights.len() => None,
            n => return Err(anyhow!("{n} of {} weights are null", weights.len())),
        };

        Ok(Self::from_parts(src_ids, dst_ids, weights)?)
    }
}

fn to_vertex<V: VertexId>(raw: u64) -> Result<V> {
    V::from_u64(raw).ok_or_else(|| anyhow!("vertex id {raw} does not fit the vertex id type"))
}
