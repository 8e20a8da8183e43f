use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use gzpar_core::{BoundedOrderedQueue, GzparError, ReorderBuffer, Sequenced};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Item {
    index: u32,
    payload: u64,
}

impl Item {
    fn new(index: u32) -> Self {
        Self {
            index,
            payload: u64::from(index) * 31,
        }
    }
}

impl Sequenced for Item {
    fn sequence_index(&self) -> u32 {
        self.index
    }
}

#[test]
fn ordered_queue_restores_permuted_indices() -> Result<(), Box<dyn std::error::Error>> {
    const TOTAL: u32 = 200;
    const PRODUCERS: u32 = 4;
    let queue = BoundedOrderedQueue::new(4, true);

    // 37 is coprime with 200, so this walks every index exactly once.
    let permutation: Vec<u32> = (0..TOTAL).map(|i| (i * 37) % TOTAL).collect();

    let received = thread::scope(|scope| {
        let consumer = scope.spawn(|| {
            let mut seen = Vec::new();
            while let Some(item) = queue.pop() {
                seen.push(item);
            }
            seen
        });

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let queue = &queue;
                let permutation = &permutation;
                scope.spawn(move || -> Result<(), GzparError> {
                    let share = permutation
                        .iter()
                        .skip(producer as usize)
                        .step_by(PRODUCERS as usize);
                    for index in share {
                        assert!(queue.push(Item::new(*index))?);
                    }
                    Ok(())
                })
            })
            .collect();

        for producer in producers {
            producer.join().expect("producer panicked")?;
        }
        queue.close();
        Ok::<_, GzparError>(consumer.join().expect("consumer panicked"))
    })?;

    assert_eq!(received.len(), TOTAL as usize);
    for (expected, item) in received.iter().enumerate() {
        assert_eq!(item.index, expected as u32);
        assert_eq!(item.payload, expected as u64 * 31);
    }

    let stats = queue.stats();
    assert_eq!(stats.pushed, u64::from(TOTAL));
    assert_eq!(stats.popped, u64::from(TOTAL));
    assert_eq!(stats.pending, 0);
    Ok(())
}

#[test]
fn producer_waits_while_queue_is_over_capacity() -> Result<(), Box<dyn std::error::Error>> {
    let queue = Arc::new(BoundedOrderedQueue::new(1, false));
    assert!(queue.push(Item::new(0))?);
    assert!(queue.push(Item::new(1))?);

    let pushed = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let pushed = Arc::clone(&pushed);
        thread::spawn(move || {
            let accepted = queue.push(Item::new(2));
            pushed.store(true, Ordering::Release);
            accepted
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!pushed.load(Ordering::Acquire));
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.pop().map(|item| item.index), Some(0));
    assert!(producer.join().expect("producer panicked")?);
    assert!(pushed.load(Ordering::Acquire));
    assert_eq!(queue.len(), 2);
    Ok(())
}

#[test]
fn ordered_producer_waits_only_on_released_items() -> Result<(), Box<dyn std::error::Error>> {
    let queue = Arc::new(BoundedOrderedQueue::new(1, true));

    // Early arrivals sit in the reorder buffer and never hold up a producer.
    assert!(queue.push(Item::new(3))?);
    assert!(queue.push(Item::new(4))?);
    assert_eq!(queue.len(), 0);
    assert_eq!(queue.pending_len(), 2);

    assert!(queue.push(Item::new(0))?);
    assert!(queue.push(Item::new(1))?);
    assert_eq!(queue.len(), 2);

    let pushed = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let pushed = Arc::clone(&pushed);
        thread::spawn(move || {
            let accepted = queue.push(Item::new(2));
            pushed.store(true, Ordering::Release);
            accepted
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!pushed.load(Ordering::Acquire));
    assert_eq!(queue.pending_len(), 2);

    assert_eq!(queue.pop().map(|item| item.index), Some(0));
    assert!(producer.join().expect("producer panicked")?);
    assert!(pushed.load(Ordering::Acquire));
    assert_eq!(queue.pending_len(), 0);

    queue.close();
    let drained: Vec<u32> = std::iter::from_fn(|| queue.pop()).map(|item| item.index).collect();
    assert_eq!(drained, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn closed_queue_drains_before_reporting_end() -> Result<(), Box<dyn std::error::Error>> {
    let queue = BoundedOrderedQueue::new(8, false);
    for index in 0..3 {
        queue.push(Item::new(index))?;
    }
    queue.close();
    queue.close();

    assert!(queue.is_closed());
    assert!(!queue.push(Item::new(3))?);

    let drained: Vec<u32> = std::iter::from_fn(|| queue.pop()).map(|item| item.index).collect();
    assert_eq!(drained, vec![0, 1, 2]);
    assert!(queue.pop().is_none());
    assert!(queue.is_empty());
    Ok(())
}

#[test]
fn blocked_consumer_wakes_on_close() {
    let queue = Arc::new(BoundedOrderedQueue::<Item>::new(2, false));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(20));
    queue.close();
    assert!(consumer.join().expect("consumer panicked").is_none());
}

#[test]
fn blocked_producer_wakes_on_close() -> Result<(), Box<dyn std::error::Error>> {
    let queue = Arc::new(BoundedOrderedQueue::new(0, false));
    assert!(queue.push(Item::new(0))?);

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(Item::new(1)))
    };

    thread::sleep(Duration::from_millis(20));
    queue.close();
    assert!(!producer.join().expect("producer panicked")?);
    assert_eq!(queue.len(), 1);
    Ok(())
}

#[test]
fn ordered_queue_parks_early_items_outside_capacity() -> Result<(), Box<dyn std::error::Error>> {
    let queue = BoundedOrderedQueue::new(0, true);
    for index in (1..6).rev() {
        assert!(queue.push(Item::new(index))?);
    }
    assert_eq!(queue.len(), 0);
    assert_eq!(queue.pending_len(), 5);
    assert_eq!(queue.next_expected(), 0);

    queue.push(Item::new(0))?;
    assert_eq!(queue.len(), 6);
    assert_eq!(queue.pending_len(), 0);
    assert_eq!(queue.next_expected(), 6);

    let stats = queue.stats();
    assert_eq!(stats.peak_pending, 5);
    assert_eq!(stats.peak_resident, 6);
    assert!(stats.ordered);
    Ok(())
}

#[test]
fn ordered_queue_rejects_stale_index() -> Result<(), Box<dyn std::error::Error>> {
    let queue = BoundedOrderedQueue::new(4, true);
    queue.push(Item::new(0))?;

    match queue.push(Item::new(0)) {
        Err(GzparError::InvalidBlockId { expected, actual }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn ordered_queue_rejects_duplicate_pending_index() -> Result<(), Box<dyn std::error::Error>> {
    let queue = BoundedOrderedQueue::new(4, true);
    queue.push(Item::new(3))?;

    let err = queue.push(Item::new(3)).expect_err("duplicate must fail");
    assert!(err.is_format());
    assert_eq!(queue.pending_len(), 1);
    Ok(())
}

#[test]
fn reorder_buffer_releases_contiguous_runs() -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = ReorderBuffer::new();
    let mut ready = Vec::new();

    buffer.push(2, "c", &mut ready)?;
    buffer.push(1, "b", &mut ready)?;
    assert!(ready.is_empty());
    assert_eq!(buffer.first_pending(), Some(1));

    buffer.push(0, "a", &mut ready)?;
    assert_eq!(ready, vec!["a", "b", "c"]);

    buffer.push(4, "e", &mut ready)?;
    assert_eq!(buffer.next_expected(), 3);
    assert_eq!(buffer.pending_len(), 1);
    assert_eq!(buffer.peak_pending(), 2);
    Ok(())
}
