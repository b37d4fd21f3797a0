//! Every parse and save/load call must release what it allocated, on the
//! success path and on the failure path. Live bytes are tracked per thread so
//! the harness's own threads do not disturb the count.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::Arc;
use vdb_core::{load_batch, parse_filter, ChunkWriter, ChunkWriterOptions};

struct Counting;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

fn track(delta: isize) {
    // try_with: the slot may already be gone during thread teardown
    let _ = LIVE.try_with(|live| live.set(live.get() + delta));
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let p = System.alloc(layout);
        if !p.is_null() {
            track(layout.size() as isize);
        }
        p
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        track(-(layout.size() as isize));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let p = System.realloc(ptr, layout, new_size);
        if !p.is_null() {
            track(new_size as isize - layout.size() as isize);
        }
        p
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn live() -> isize {
    LIVE.with(|l| l.get())
}

/// Run `f` once to settle lazily initialised state, then assert a second run
/// leaves no bytes behind.
fn assert_released(f: impl Fn()) {
    f();
    let before = live();
    f();
    assert_eq!(live() - before, 0, "allocations outlived the call");
}

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, false),
        Field::new("e", DataType::Utf8, true),
    ]))
}

fn batch() -> RecordBatch {
    let labels: StringArray = (0..2_000).map(|i| Some(format!("v{i}"))).collect();
    RecordBatch::try_new(schema(), vec![Arc::new(Int64Array::from_iter_values(0..2_000)), Arc::new(labels)])
        .unwrap()
}

#[test]
fn parse_calls_release_everything() {
    let schema = schema();
    assert_released(|| {
        let expr = parse_filter(&schema, "a = 1 AND e LIKE '%x%' OR NOT (a IN (1,2,3) OR e IS NULL)").unwrap();
        assert!(!expr.to_string().is_empty());
    });
    assert_released(|| assert!(parse_filter(&schema, "a = 1 AND ghost = 2").is_err()));
    assert_released(|| assert!(parse_filter(&schema, "e = 'unterminated").is_err()));
}

#[test]
fn save_and_load_release_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alloc.vdbsnap");
    let batch = batch();
    let schema = schema();
    let writer = ChunkWriter::new(ChunkWriterOptions { max_chunk_bytes: 8 * 1024, sync: false });
    assert_released(|| {
        writer.write(&path, &batch).unwrap();
        let loaded = load_batch(&path, &schema).unwrap();
        assert_eq!(loaded.num_rows(), 2_000);
    });
    let wrong = Schema::new(vec![Field::new("a", DataType::Int32, false)]);
    assert_released(|| assert!(load_batch(&path, &wrong).is_err()));
    let missing = dir.path().join("missing").join("x.vdbsnap");
    assert_released(|| assert!(writer.write(&missing, &batch).is_err()));
}
