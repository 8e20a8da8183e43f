use std::thread;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use gzpar_core::{
    Block, BlockFramer, BoundedOrderedQueue, Direction, FramerSettings, FramingMode, GzipCodec,
    MemoryBudget,
};

const ITEMS: u32 = 4_096;

/// Index order in which items reach the queue: runs of `stride` arrive reversed.
fn scrambled_indices(total: u32, stride: u32) -> Vec<u32> {
    let mut indices: Vec<u32> = (0..total).collect();
    for chunk in indices.chunks_mut(stride as usize) {
        chunk.reverse();
    }
    indices
}

fn run_queue(indices: &[u32], producers: usize, ordered: bool, capacity: u64) -> u64 {
    let queue = BoundedOrderedQueue::new(capacity, ordered);

    thread::scope(|scope| {
        let consumer = scope.spawn(|| {
            let mut checksum = 0u64;
            while let Some(block) = queue.pop() {
                checksum = checksum.wrapping_mul(31).wrapping_add(u64::from(block.sequence_index));
            }
            checksum
        });

        let handles: Vec<_> = (0..producers)
            .map(|producer| {
                let queue = &queue;
                scope.spawn(move || {
                    for index in indices.iter().skip(producer).step_by(producers) {
                        let accepted = queue
                            .push(Block::new(*index, Vec::new()))
                            .expect("benchmark indices are unique");
                        assert!(accepted);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("producer panicked");
        }
        queue.close();
        consumer.join().expect("consumer panicked")
    })
}

fn bench_queue(c: &mut Criterion) {
    let producers = num_cpus::get().clamp(2, 8);
    let indices = scrambled_indices(ITEMS, 16);

    let mut group = c.benchmark_group("queue_throughput");
    group.throughput(Throughput::Elements(u64::from(ITEMS)));

    group.bench_function("unordered", |b| {
        b.iter(|| black_box(run_queue(&indices, producers, false, 64)))
    });

    group.bench_function("ordered", |b| {
        b.iter(|| black_box(run_queue(&indices, producers, true, 64)))
    });

    group.bench_function("ordered_tight_capacity", |b| {
        b.iter(|| black_box(run_queue(&indices, producers, true, 2)))
    });

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let block_size = 256 * 1024;
    let settings = FramerSettings::from_budget(
        &MemoryBudget::fixed(64 * 1024 * 1024, block_size),
        GzipCodec::default(),
    );
    let data: Vec<u8> = (0..block_size).map(|i| (i % 251) as u8 ^ (i / 4096) as u8).collect();

    let mut group = c.benchmark_group("framer_transform");
    group.throughput(Throughput::Bytes(block_size as u64));

    for mode in [FramingMode::Sequential, FramingMode::IndexTagged] {
        let framer = BlockFramer::new(Direction::Compress, mode, settings);
        group.bench_function(mode.name(), |b| {
            b.iter(|| {
                let block = framer
                    .transform(Block::new(0, data.clone()))
                    .expect("compression succeeds");
                black_box(block.output().map(<[u8]>::len))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_queue, bench_transform);
criterion_main!(benches);
