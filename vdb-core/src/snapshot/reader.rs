use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::ipc::reader::StreamReader;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use memmap2::Mmap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use vdb_common::{FormatError, Result};
use xxhash_rust::xxh3::xxh3_64;

use super::format::{check_schema, parse_layout, ChunkEntry, SnapshotInfo, MIN_FILE_LEN};

fn map_file(path: &Path) -> Result<Mmap> {
    let file = std::fs::File::open(path)?;
    if file.metadata()?.len() < MIN_FILE_LEN {
        return Err(FormatError::Truncated("header").into());
    }
    // read-only mapping; callers serialize writers and readers of one path
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Header and segment directory, without decoding column data.
pub fn read_snapshot_info(path: &Path) -> Result<SnapshotInfo> {
    let mmap = map_file(path)?;
    Ok(parse_layout(&mmap)?)
}

/// Load a snapshot written by [`super::ChunkWriter`], checking it against
/// `expected`. The result owns its buffers; the file mapping is released
/// before returning.
pub fn load_batch(path: &Path, expected: &Schema) -> Result<RecordBatch> {
    let mmap = map_file(path)?;
    let layout = parse_layout(&mmap)?;
    check_schema(expected, &layout.schema)?;

    let mut batches = Vec::with_capacity(layout.chunks.len());
    for entry in &layout.chunks {
        let start = entry.offset as usize;
        let payload = &mmap[start..start + entry.byte_len as usize];
        if xxh3_64(payload) != entry.checksum {
            return Err(FormatError::ChecksumMismatch { chunk: entry.index }.into());
        }
        batches.push(decode_chunk(payload, entry, &layout.schema)?);
    }

    let target = Arc::new(expected.clone());
    let columns = match batches.len() {
        0 => RecordBatch::new_empty(target.clone()).columns().to_vec(),
        1 => batches[0].columns().to_vec(),
        _ => concat_batches(&batches[0].schema(), &batches)?.columns().to_vec(),
    };
    let options = RecordBatchOptions::new().with_row_count(Some(layout.total_rows as usize));
    let batch = RecordBatch::try_new_with_options(target, columns, &options)?;
    if batch.num_rows() as u64 != layout.total_rows {
        return Err(FormatError::RowCountMismatch {
            expected: layout.total_rows,
            actual: batch.num_rows() as u64,
        }
        .into());
    }
    info!(path = %path.display(), rows = batch.num_rows(), chunks = layout.chunk_count, "snapshot loaded");
    Ok(batch)
}

fn decode_chunk(payload: &[u8], entry: &ChunkEntry, header: &Schema) -> Result<RecordBatch> {
    let corrupt = |e: arrow::error::ArrowError| FormatError::Corrupt(format!("chunk {}: {e}", entry.index));
    let reader = StreamReader::try_new(Cursor::new(payload), None).map_err(corrupt)?;
    let schema = reader.schema();
    if schema.as_ref() != header {
        return Err(FormatError::Corrupt(format!("chunk {}: schema differs from the header", entry.index)).into());
    }
    let parts = reader.collect::<std::result::Result<Vec<_>, _>>().map_err(corrupt)?;
    let batch = match parts.len() {
        1 => parts.into_iter().next().ok_or(FormatError::Corrupt("empty chunk".into()))?,
        _ => concat_batches(&schema, &parts).map_err(corrupt)?,
    };
    if batch.num_rows() as u64 != entry.row_count {
        return Err(FormatError::ChunkRowMismatch {
            chunk: entry.index,
            expected: entry.row_count,
            actual: batch.num_rows() as u64,
        }
        .into());
    }
    debug!(chunk = entry.index, rows = batch.num_rows(), "chunk decoded");
    Ok(batch)
}
