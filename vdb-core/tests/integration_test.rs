use arrow::array::{
    BooleanArray, FixedSizeListArray, Float64Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Float32Type, Schema};
use arrow::record_batch::RecordBatch;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use vdb_core::{
    filter_batch, load_batch, parse_filter, read_snapshot_info, save_batch, ChunkWriter,
    ChunkWriterOptions, FormatError, VdbError,
};

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Fixture { dir: tempfile::tempdir().unwrap() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn int_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![Field::new("large_column", DataType::Int64, false)]))
}

fn int_batch(n: i64) -> RecordBatch {
    RecordBatch::try_new(int_schema(), vec![Arc::new(Int64Array::from_iter_values(0..n))]).unwrap()
}

fn mixed_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
        Field::new("score", DataType::Float64, true),
        Field::new("active", DataType::Boolean, true),
        Field::new(
            "embedding",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), 4),
            true,
        ),
    ]))
}

fn mixed_batch(n: usize) -> RecordBatch {
    let ids = Int64Array::from_iter_values(0..n as i64);
    let labels: StringArray = (0..n)
        .map(|i| if i % 7 == 0 { None } else { Some(format!("label-{}", i % 100)) })
        .collect();
    let scores: Float64Array = (0..n)
        .map(|i| if i % 11 == 0 { None } else { Some(i as f64 * 0.5) })
        .collect();
    let active: BooleanArray = (0..n).map(|i| Some(i % 3 == 0)).collect();
    let embedding = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        (0..n).map(|i| Some((0..4).map(|k| Some((i * 4 + k) as f32)).collect::<Vec<_>>())),
        4,
    );
    RecordBatch::try_new(
        mixed_schema(),
        vec![
            Arc::new(ids),
            Arc::new(labels),
            Arc::new(scores),
            Arc::new(active),
            Arc::new(embedding),
        ],
    )
    .unwrap()
}

fn small_chunks(bytes: u64) -> ChunkWriter {
    ChunkWriter::new(ChunkWriterOptions { max_chunk_bytes: bytes, sync: false })
}

#[test]
fn round_trip_under_the_limit() {
    let fx = Fixture::new();
    let path = fx.path("under.vdbsnap");
    let batch = int_batch(1_000_000);
    save_batch(&path, &batch).unwrap();
    let loaded = load_batch(&path, &int_schema()).unwrap();
    assert_eq!(loaded, batch);
    assert_eq!(read_snapshot_info(&path).unwrap().chunk_count, 1);
}

#[test]
fn round_trip_far_over_the_limit() {
    let fx = Fixture::new();
    let path = fx.path("over.vdbsnap");
    let batch = int_batch(300_000);
    let summary = small_chunks(4 * 1024).write(&path, &batch).unwrap();
    assert!(summary.chunks > 100, "chunks: {}", summary.chunks);
    let loaded = load_batch(&path, &int_schema()).unwrap();
    assert_eq!(loaded.num_rows(), 300_000);
    assert_eq!(loaded, batch);
}

#[test]
fn mixed_columns_survive_segmentation() {
    let fx = Fixture::new();
    let path = fx.path("mixed.vdbsnap");
    let batch = mixed_batch(5_000);
    let summary = small_chunks(16 * 1024).write(&path, &batch).unwrap();
    assert!(summary.chunks > 1);
    let info = read_snapshot_info(&path).unwrap();
    assert!(info.largest_chunk_bytes() <= 16 * 1024);
    assert_eq!(load_batch(&path, &mixed_schema()).unwrap(), batch);
}

#[test]
fn segmentation_is_invisible_to_the_result() {
    let fx = Fixture::new();
    let whole = fx.path("whole.vdbsnap");
    let split = fx.path("split.vdbsnap");
    let batch = mixed_batch(3_000);
    save_batch(&whole, &batch).unwrap();
    small_chunks(8 * 1024).write(&split, &batch).unwrap();
    assert_eq!(read_snapshot_info(&whole).unwrap().chunk_count, 1);
    assert!(read_snapshot_info(&split).unwrap().chunk_count > 1);
    let a = load_batch(&whole, &mixed_schema()).unwrap();
    let b = load_batch(&split, &mixed_schema()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn sliced_input_round_trips() {
    let fx = Fixture::new();
    let path = fx.path("slice.vdbsnap");
    let batch = mixed_batch(2_000).slice(500, 1_000);
    small_chunks(8 * 1024).write(&path, &batch).unwrap();
    assert_eq!(load_batch(&path, &mixed_schema()).unwrap(), batch);
}

#[test]
fn empty_batch_round_trips() {
    let fx = Fixture::new();
    let path = fx.path("empty.vdbsnap");
    let batch = RecordBatch::new_empty(mixed_schema());
    save_batch(&path, &batch).unwrap();
    let loaded = load_batch(&path, &mixed_schema()).unwrap();
    assert_eq!(loaded.num_rows(), 0);
    assert_eq!(loaded.schema(), mixed_schema());
}

#[test]
fn save_overwrites_existing_file() {
    let fx = Fixture::new();
    let path = fx.path("snap.vdbsnap");
    save_batch(&path, &int_batch(10)).unwrap();
    save_batch(&path, &int_batch(3)).unwrap();
    assert_eq!(load_batch(&path, &int_schema()).unwrap().num_rows(), 3);
}

#[test]
fn flipped_payload_byte_fails_checksum() {
    let fx = Fixture::new();
    let path = fx.path("flip.vdbsnap");
    small_chunks(8 * 1024).write(&path, &int_batch(5_000)).unwrap();
    let info = read_snapshot_info(&path).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    let target = info.chunks[1].offset as usize + 100;
    bytes[target] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();
    let err = load_batch(&path, &int_schema()).unwrap_err();
    assert!(matches!(err, VdbError::Format(FormatError::ChecksumMismatch { chunk: 1 })), "{err}");
}

#[test]
fn truncated_file_is_rejected() {
    let fx = Fixture::new();
    let path = fx.path("cut.vdbsnap");
    small_chunks(8 * 1024).write(&path, &int_batch(5_000)).unwrap();
    let len = std::fs::metadata(&path).unwrap().len();
    for cut in [len - 4, len - 20, len / 2, 10] {
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(cut).unwrap();
        drop(file);
        let err = load_batch(&path, &int_schema()).unwrap_err();
        assert!(matches!(err, VdbError::Format(_)), "cut at {cut}: {err}");
    }
}

#[test]
fn foreign_file_is_rejected() {
    let fx = Fixture::new();
    let path = fx.path("notes.txt");
    std::fs::write(&path, "x".repeat(256)).unwrap();
    let err = load_batch(&path, &int_schema()).unwrap_err();
    assert!(matches!(err, VdbError::Format(FormatError::BadMagic)));
}

#[test]
fn incompatible_schema_is_rejected() {
    let fx = Fixture::new();
    let path = fx.path("schema.vdbsnap");
    save_batch(&path, &int_batch(10)).unwrap();
    let other = Schema::new(vec![Field::new("large_column", DataType::Int32, false)]);
    let err = load_batch(&path, &other).unwrap_err();
    assert!(matches!(err, VdbError::Format(FormatError::SchemaMismatch(_))));
    let wider = Schema::new(vec![
        Field::new("large_column", DataType::Int64, false),
        Field::new("extra", DataType::Utf8, true),
    ]);
    assert!(load_batch(&path, &wider).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    let fx = Fixture::new();
    let err = load_batch(&fx.path("nope.vdbsnap"), &int_schema()).unwrap_err();
    assert!(matches!(err, VdbError::Io(_)));
}

#[test]
fn filter_runs_over_a_reloaded_snapshot() {
    let fx = Fixture::new();
    let path = fx.path("query.vdbsnap");
    small_chunks(16 * 1024).write(&path, &mixed_batch(1_000)).unwrap();
    let loaded = load_batch(&path, &mixed_schema()).unwrap();
    let expr = parse_filter(&loaded.schema(), "id < 100 AND (label IS NULL OR active = TRUE)").unwrap();
    let hits = filter_batch(&loaded, &expr).unwrap();
    // ids below 100 that are multiples of 7 or of 3
    let expected = (0..100).filter(|i| i % 7 == 0 || i % 3 == 0).count();
    assert_eq!(hits.num_rows(), expected);
    assert!(parse_filter(&loaded.schema(), "missing = 1").is_err());
}
