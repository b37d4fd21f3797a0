//! Chunked persistence of a `RecordBatch`.
//!
//! A single Arrow IPC message is addressed with a 32-bit length, so a batch
//! is written as a run of independently encoded IPC streams (chunks), each
//! covering a contiguous row range and each no larger than
//! [`ChunkWriterOptions::max_chunk_bytes`]. Layout, integers little-endian:
//!
//! ```text
//! "VDBSNAP\0" | version u32 | total_rows u64 | chunk_count u64 | schema_len u64 | schema IPC
//! chunk_count x ( row_count u64 | byte_len u64 | xxh3 u64 | IPC stream )
//! "VDBSEND\0" | chunk_count u64
//! ```

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{ChunkEntry, ColumnInfo, SnapshotInfo, FORMAT_VERSION};
pub use reader::{load_batch, read_snapshot_info};
pub use writer::{save_batch, ChunkWriter, ChunkWriterOptions, WriteSummary, IPC_MESSAGE_LIMIT};
