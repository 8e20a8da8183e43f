use std::io::Read;

use bytes::Bytes;
use gzpar_core::budget::{ALLOC_CAP_32BIT, ALLOC_CAP_64BIT, platform_alloc_cap};
use gzpar_core::telemetry::parse_meminfo;
use gzpar_core::{
    Block, CountingReader, DEFAULT_BLOCK_SIZE, Direction, FramingMode, GzparError, MemoryBudget,
    Sequenced,
};

#[test]
fn block_starts_untransformed() {
    let block = Block::new(7, Bytes::from_static(b"abc"));

    assert_eq!(block.sequence_index(), 7);
    assert_eq!(block.input_len(), 3);
    assert!(!block.is_transformed());
    assert!(block.output().is_none());
}

#[test]
fn block_output_is_set_once() -> Result<(), Box<dyn std::error::Error>> {
    let mut block = Block::new(1, b"raw".to_vec());
    block.set_output(vec![9, 9])?;

    assert!(block.is_transformed());
    assert_eq!(block.input_len(), 0);
    assert_eq!(block.output(), Some(&[9u8, 9][..]));
    assert!(block.set_output(vec![1]).is_err());
    assert_eq!(block.into_output(), Some(vec![9, 9]));
    Ok(())
}

#[test]
fn framing_mode_names() {
    assert_eq!(FramingMode::from_name("gz"), Some(FramingMode::Sequential));
    assert_eq!(FramingMode::from_name("AgZ"), Some(FramingMode::IndexTagged));
    assert_eq!(FramingMode::from_name("zip"), None);
    assert_eq!(FramingMode::IndexTagged.name(), "agz");
    assert_eq!(Direction::Decompress.to_string(), "decompress");
}

#[test]
fn budget_derives_capacity_from_available_memory() {
    let budget = MemoryBudget::fixed(64 * 1024 * 1024, DEFAULT_BLOCK_SIZE);

    assert_eq!(budget.block_size(), 1_048_576);
    assert_eq!(budget.alloc_limit(), 64 * 1024 * 1024);
    assert_eq!(budget.queue_capacity(), 64);
}

#[test]
fn budget_caps_allocation_per_platform() {
    let budget = MemoryBudget::fixed(u64::MAX, DEFAULT_BLOCK_SIZE);

    assert_eq!(budget.alloc_limit(), platform_alloc_cap());
    if cfg!(target_pointer_width = "64") {
        assert_eq!(budget.alloc_limit(), ALLOC_CAP_64BIT);
        assert_eq!(budget.queue_capacity(), 2_000);
    } else {
        assert_eq!(budget.alloc_limit(), ALLOC_CAP_32BIT);
    }
}

#[test]
fn budget_tolerates_zero_block_size() {
    let budget = MemoryBudget::fixed(1_000, 0);
    assert_eq!(budget.block_size(), 1);
    assert_eq!(budget.queue_capacity(), 1_000);
}

#[test]
fn detected_budget_is_positive() {
    let budget = MemoryBudget::detect(DEFAULT_BLOCK_SIZE);
    assert!(budget.alloc_limit() > 0);
}

#[test]
fn meminfo_fields_are_parsed_in_bytes() {
    let listing = "MemTotal:       16384000 kB\n\
                   MemFree:         1000000 kB\n\
                   MemAvailable:    8192000 kB\n";
    let sample = parse_meminfo(listing);

    assert_eq!(sample.total_bytes, Some(16_384_000 * 1024));
    assert_eq!(sample.available_bytes, Some(8_192_000 * 1024));
    assert_eq!(parse_meminfo("garbage").available_bytes, None);
}

#[test]
fn counting_reader_tracks_consumed_bytes() -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = CountingReader::new(&b"0123456789"[..]);
    let counter = reader.counter();

    let mut head = [0u8; 4];
    reader.read_exact(&mut head)?;
    assert_eq!(reader.consumed(), 4);

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    assert_eq!(counter.load(std::sync::atomic::Ordering::Acquire), 10);
    Ok(())
}

#[test]
fn converts_io_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: GzparError = io_error.into();

    match error {
        GzparError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn converts_anyhow_error() {
    let error: GzparError = anyhow::anyhow!("boom").into();

    match error {
        GzparError::Other(err) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn context_preserves_format_classification() {
    let err = GzparError::Format("gzip magic mismatch").with_context("block 4");

    assert!(err.is_format());
    assert_eq!(err.to_string(), "block 4: invalid format: gzip magic mismatch");
    match err {
        GzparError::Context { context, source } => {
            assert_eq!(context, "block 4");
            assert!(matches!(*source, GzparError::Format("gzip magic mismatch")));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!GzparError::Codec("bad".into()).with_context("block 1").is_format());
}
