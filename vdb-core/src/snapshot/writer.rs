use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vdb_common::{FormatError, Result, SnapshotConfig, VdbError};
use xxhash_rust::xxh3::xxh3_64;

use super::format::{
    encode_chunk_header, encode_header, encode_schema, encode_trailer, CHUNK_COUNT_OFFSET,
};

pub use vdb_common::config::IPC_MESSAGE_LIMIT;

#[derive(Debug, Clone)]
pub struct ChunkWriterOptions {
    /// Upper bound on one encoded chunk, IPC framing included.
    pub max_chunk_bytes: u64,
    pub sync: bool,
}

impl Default for ChunkWriterOptions {
    fn default() -> Self {
        Self {
            max_chunk_bytes: IPC_MESSAGE_LIMIT,
            sync: true,
        }
    }
}

impl From<&SnapshotConfig> for ChunkWriterOptions {
    fn from(cfg: &SnapshotConfig) -> Self {
        Self {
            max_chunk_bytes: cfg.max_chunk_bytes,
            sync: cfg.sync,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: u64,
    pub chunks: u64,
    pub bytes_written: u64,
}

pub struct ChunkWriter {
    options: ChunkWriterOptions,
}

impl ChunkWriter {
    pub fn new(options: ChunkWriterOptions) -> Self {
        ChunkWriter { options }
    }

    /// Write `batch` to `path`. Data goes to `<path>.partial` first and is
    /// renamed over `path` only after every chunk and the trailer are on disk.
    pub fn write(&self, path: &Path, batch: &RecordBatch) -> Result<WriteSummary> {
        let limit = self.options.max_chunk_bytes;
        if limit == 0 || limit > IPC_MESSAGE_LIMIT {
            return Err(VdbError::Other(format!(
                "max_chunk_bytes must be in 1..={IPC_MESSAGE_LIMIT}, got {limit}"
            )));
        }
        let tmp = partial_path(path);
        let summary = self
            .write_file(&tmp, batch)
            .and_then(|summary| std::fs::rename(&tmp, path).map(|_| summary).map_err(VdbError::from));
        match summary {
            Ok(summary) => {
                info!(
                    path = %path.display(),
                    rows = summary.rows,
                    chunks = summary.chunks,
                    bytes = summary.bytes_written,
                    "snapshot saved"
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&tmp) {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %tmp.display(), error = %rm, "could not remove partial snapshot");
                    }
                }
                Err(e)
            }
        }
    }

    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<WriteSummary> {
        let limit = self.options.max_chunk_bytes;
        let schema_bytes = encode_schema(&batch.schema())?;
        let total_rows = batch.num_rows() as u64;

        let file = File::create(path)?;
        let mut out = BufWriter::with_capacity(64 * 1024, file);
        // chunk count is patched once the split is known
        let header = encode_header(total_rows, 0, &schema_bytes);
        out.write_all(&header)?;
        let mut bytes_written = header.len() as u64;

        let overhead = schema_bytes.len() as u64 + 512 + 3 * 64 * batch.num_columns() as u64;
        let row_bytes = estimate_row_bytes(batch);
        let mut chunks = 0u64;
        let mut offset = 0usize;
        // an empty batch still gets one zero-row chunk
        while offset < batch.num_rows() || chunks == 0 {
            let remaining = batch.num_rows() - offset;
            let budget = limit.saturating_sub(overhead) as f64;
            let mut rows = ((budget / row_bytes) as usize).clamp(remaining.min(1), remaining);
            let payload = loop {
                let payload = encode_chunk(&batch.slice(offset, rows))?;
                let encoded = payload.len() as u64;
                if encoded <= limit {
                    break payload;
                }
                if rows <= 1 {
                    return Err(FormatError::RowTooLarge { row: offset, encoded, limit }.into());
                }
                // shrink in proportion to the overshoot, with 10% headroom
                let scaled = (rows as f64 * limit as f64 / encoded as f64 * 0.9) as usize;
                debug!(rows, encoded, limit, next = scaled, "chunk candidate over limit");
                rows = scaled.clamp(1, rows - 1);
            };
            debug!(chunk = chunks, first_row = offset, rows, bytes = payload.len(), "chunk encoded");
            let entry = encode_chunk_header(rows as u64, payload.len() as u64, xxh3_64(&payload));
            out.write_all(&entry)?;
            out.write_all(&payload)?;
            bytes_written += (entry.len() + payload.len()) as u64;
            chunks += 1;
            offset += rows;
        }

        let trailer = encode_trailer(chunks);
        out.write_all(&trailer)?;
        bytes_written += trailer.len() as u64;

        let mut file = out.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(CHUNK_COUNT_OFFSET))?;
        file.write_all(&chunks.to_le_bytes())?;
        if self.options.sync {
            file.sync_all()?;
        }
        Ok(WriteSummary { rows: total_rows, chunks, bytes_written })
    }
}

/// Save with default options (chunks bounded by the IPC message limit).
pub fn save_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    ChunkWriter::new(ChunkWriterOptions::default()).write(path, batch)?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

pub(crate) fn encode_chunk(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut writer = StreamWriter::try_new(Vec::new(), &batch.schema())?;
    writer.write(batch)?;
    writer.finish()?;
    Ok(writer.into_inner()?)
}

// average buffer bytes per row; buffers of sliced inputs are counted whole,
// which only makes the first guess smaller
fn estimate_row_bytes(batch: &RecordBatch) -> f64 {
    if batch.num_rows() == 0 {
        return 1.0;
    }
    let total: usize = batch.columns().iter().map(|c| c.get_buffer_memory_size()).sum();
    (total as f64 / batch.num_rows() as f64).max(1.0)
}
