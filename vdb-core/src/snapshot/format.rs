use arrow::datatypes::{Schema, SchemaRef};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use vdb_common::{FormatError, Result};

pub const MAGIC: &[u8; 8] = b"VDBSNAP\0";
pub const TRAILER_MAGIC: &[u8; 8] = b"VDBSEND\0";
pub const FORMAT_VERSION: u32 = 1;

/// Byte offset of the chunk count inside the header (magic + version + total_rows).
pub(crate) const CHUNK_COUNT_OFFSET: u64 = 8 + 4 + 8;
/// Smallest possible file: header without schema bytes plus trailer.
pub(crate) const MIN_FILE_LEN: u64 = CHUNK_COUNT_OFFSET + 8 + 8 + 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub index: u64,
    pub row_count: u64,
    pub byte_len: u64,
    pub checksum: u64,
    pub offset: u64, // payload start within the file
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Header and segment directory of a snapshot file.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub file_size: u64,
    pub version: u32,
    pub total_rows: u64,
    pub chunk_count: u64,
    pub columns: Vec<ColumnInfo>,
    pub chunks: Vec<ChunkEntry>,
    #[serde(skip)]
    pub schema: SchemaRef,
}

impl SnapshotInfo {
    pub fn largest_chunk_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.byte_len).max().unwrap_or(0)
    }
}

pub(crate) fn encode_schema(schema: &Schema) -> Result<Vec<u8>> {
    let mut writer = StreamWriter::try_new(Vec::new(), schema)?;
    writer.finish()?;
    Ok(writer.into_inner()?)
}

pub(crate) fn decode_schema(bytes: &[u8]) -> std::result::Result<SchemaRef, FormatError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)
        .map_err(|e| FormatError::Corrupt(format!("unreadable schema: {e}")))?;
    Ok(reader.schema())
}

pub(crate) fn encode_header(total_rows: u64, chunk_count: u64, schema_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_COUNT_OFFSET as usize + 16 + schema_bytes.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&total_rows.to_le_bytes());
    out.extend_from_slice(&chunk_count.to_le_bytes());
    out.extend_from_slice(&(schema_bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(schema_bytes);
    out
}

pub(crate) fn encode_chunk_header(row_count: u64, byte_len: u64, checksum: u64) -> [u8; 24] {
    let mut out = [0u8; 24];
    out[..8].copy_from_slice(&row_count.to_le_bytes());
    out[8..16].copy_from_slice(&byte_len.to_le_bytes());
    out[16..].copy_from_slice(&checksum.to_le_bytes());
    out
}

pub(crate) fn encode_trailer(chunk_count: u64) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(TRAILER_MAGIC);
    out[8..].copy_from_slice(&chunk_count.to_le_bytes());
    out
}

struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn take(&mut self, n: u64, what: &'static str) -> std::result::Result<&'a [u8], FormatError> {
        let n = usize::try_from(n).map_err(|_| FormatError::Truncated(what))?;
        let end = self.pos.checked_add(n).ok_or(FormatError::Truncated(what))?;
        let out = self.buf.get(self.pos..end).ok_or(FormatError::Truncated(what))?;
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self, what: &'static str) -> std::result::Result<u32, FormatError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &'static str) -> std::result::Result<u64, FormatError> {
        let b = self.take(8, what)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }
}

/// Walk header, segment directory and trailer without decoding any payload.
pub(crate) fn parse_layout(buf: &[u8]) -> std::result::Result<SnapshotInfo, FormatError> {
    let mut cur = ByteCursor { buf, pos: 0 };
    if cur.take(8, "magic")? != MAGIC {
        return Err(FormatError::BadMagic);
    }
    let version = cur.u32("version")?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let total_rows = cur.u64("row count")?;
    let chunk_count = cur.u64("chunk count")?;
    let schema_len = cur.u64("schema length")?;
    let schema = decode_schema(cur.take(schema_len, "schema")?)?;

    let mut chunks = Vec::new();
    let mut directory_rows = 0u64;
    for index in 0..chunk_count {
        let row_count = cur.u64("chunk header")?;
        let byte_len = cur.u64("chunk header")?;
        let checksum = cur.u64("chunk header")?;
        let offset = cur.pos as u64;
        cur.take(byte_len, "chunk payload")?;
        directory_rows = directory_rows.saturating_add(row_count);
        chunks.push(ChunkEntry { index, row_count, byte_len, checksum, offset });
    }

    let trailer = cur.take(16, "trailer").map_err(|_| FormatError::MissingTrailer)?;
    if &trailer[..8] != TRAILER_MAGIC || trailer[8..] != chunk_count.to_le_bytes() {
        return Err(FormatError::MissingTrailer);
    }
    if cur.pos != buf.len() {
        return Err(FormatError::Corrupt(format!(
            "{} unexpected bytes after trailer",
            buf.len() - cur.pos
        )));
    }
    if directory_rows != total_rows {
        return Err(FormatError::RowCountMismatch { expected: total_rows, actual: directory_rows });
    }

    let columns = schema
        .fields()
        .iter()
        .map(|f| ColumnInfo {
            name: f.name().clone(),
            data_type: f.data_type().to_string(),
            nullable: f.is_nullable(),
        })
        .collect();
    Ok(SnapshotInfo {
        file_size: buf.len() as u64,
        version,
        total_rows,
        chunk_count,
        columns,
        chunks,
        schema,
    })
}

/// Expected and persisted schemas must agree on column count, names and
/// types; a nullable persisted column cannot satisfy a non-nullable one.
pub(crate) fn check_schema(expected: &Schema, found: &Schema) -> std::result::Result<(), FormatError> {
    if expected.fields().len() != found.fields().len() {
        return Err(FormatError::SchemaMismatch(format!(
            "expected {} columns, file has {}",
            expected.fields().len(),
            found.fields().len()
        )));
    }
    for (e, f) in expected.fields().iter().zip(found.fields().iter()) {
        if e.name() != f.name() {
            return Err(FormatError::SchemaMismatch(format!(
                "expected column '{}', file has '{}'",
                e.name(),
                f.name()
            )));
        }
        if e.data_type() != f.data_type() {
            return Err(FormatError::SchemaMismatch(format!(
                "column '{}' is {} in the file, expected {}",
                e.name(),
                f.data_type(),
                e.data_type()
            )));
        }
        if !e.is_nullable() && f.is_nullable() {
            return Err(FormatError::SchemaMismatch(format!(
                "column '{}' is nullable in the file but not in the expected schema",
                e.name()
            )));
        }
    }
    Ok(())
}
