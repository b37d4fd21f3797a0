pub mod filter;
pub mod snapshot;

pub use filter::{filter_batch, parse_filter, CmpOp, Expr, ExpressionBuilder, Literal};
pub use snapshot::{
    load_batch, read_snapshot_info, save_batch, ChunkWriter, ChunkWriterOptions, SnapshotInfo,
    WriteSummary,
};
pub use vdb_common::{FormatError, LexError, ParseError, Result, VdbError};
