use futures::{Stream, StreamExt};
use logwindow::{
    BackpressureStrategy, Batch, BatcherConfig, FlushTrigger, IngestError, WindowedBatcher,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Forward every batch with the instant it was received
fn spawn_timed_consumer<T: Send + 'static>(
    batches: impl Stream<Item = Batch<T>> + Send + 'static,
) -> (
    mpsc::UnboundedReceiver<(Instant, Batch<T>)>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        tokio::pin!(batches);
        while let Some(batch) = batches.next().await {
            let _ = tx.send((Instant::now(), batch));
        }
    });
    (rx, handle)
}

fn sizes<T>(batches: &[Batch<T>]) -> Vec<usize> {
    batches.iter().map(|b| b.len()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_size_trigger_then_drain() {
    let batcher = WindowedBatcher::new(BatcherConfig::default());

    for i in 0..105 {
        batcher.ingest(format!("log_{}", i)).await.unwrap();
    }
    batcher.stop();

    let batches: Vec<_> = batcher.produce_batches().collect().await;

    assert_eq!(sizes(&batches), vec![100, 5]);
    assert_eq!(batches[0].trigger, FlushTrigger::Size);
    assert_eq!(batches[1].trigger, FlushTrigger::Drain);
    assert_eq!(batches[0].records[0], "log_0");
    assert_eq!(batches[1].records[4], "log_104");
    assert_eq!(batches[0].sequence_num, 0);
    assert_eq!(batches[1].sequence_num, 1);
}

#[tokio::test(start_paused = true)]
async fn test_time_trigger_flushes_partial_batch() {
    let config = BatcherConfig::default().with_max_window(Duration::from_millis(500));
    let batcher = WindowedBatcher::new(config);
    let handle = batcher.handle();

    let start = Instant::now();
    let (mut rx, consumer) = spawn_timed_consumer(batcher.produce_batches());

    handle.ingest("A").await.unwrap();
    handle.ingest("B").await.unwrap();

    sleep(Duration::from_millis(700)).await;

    let (emitted_at, batch) = rx.try_recv().expect("batch should have been emitted by 700ms");
    assert_eq!(batch.records, vec!["A", "B"]);
    assert_eq!(batch.trigger, FlushTrigger::Time);
    let elapsed = emitted_at - start;
    assert!(elapsed >= Duration::from_millis(500), "emitted too early: {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(700), "emitted too late: {:?}", elapsed);

    // Exactly one batch
    assert!(rx.try_recv().is_err());

    handle.stop();
    consumer.await.unwrap();
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_no_empty_batches_and_order_preserved() {
    let config = BatcherConfig::default()
        .with_max_batch_size(20)
        .with_max_window(Duration::from_millis(300));
    let batcher = WindowedBatcher::new(config);
    let handle = batcher.handle();
    let (mut rx, consumer) = spawn_timed_consumer(batcher.produce_batches());

    // Bursts and lulls: some batches close on size, some on time
    for i in 0u32..250 {
        handle.ingest(i).await.unwrap();
        let pause = match i % 37 {
            0 => Duration::from_millis(900),
            n if n % 5 == 0 => Duration::from_millis(40),
            _ => Duration::ZERO,
        };
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }
    handle.stop();
    consumer.await.unwrap();

    let mut batches = Vec::new();
    while let Some((_, batch)) = rx.recv().await {
        batches.push(batch);
    }

    assert!(batches.iter().all(|b| !b.is_empty()));
    assert!(batches.iter().all(|b| b.len() <= 20));
    assert!(batches.iter().any(|b| b.trigger == FlushTrigger::Size));
    assert!(batches.iter().any(|b| b.trigger == FlushTrigger::Time));

    let flattened: Vec<u32> = batches.iter().flat_map(|b| b.records.clone()).collect();
    assert_eq!(flattened, (0..250).collect::<Vec<_>>());

    let sequence: Vec<u64> = batches.iter().map(|b| b.sequence_num).collect();
    assert_eq!(sequence, (0..batches.len() as u64).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_drain_on_stop_emits_single_final_batch() {
    let batcher = WindowedBatcher::new(BatcherConfig::default());
    let handle = batcher.handle();
    let batches = batcher.produce_batches();

    for record in ["x", "y", "z"] {
        handle.ingest(record).await.unwrap();
    }

    let start = Instant::now();
    handle.stop();
    let batches: Vec<_> = batches.collect().await;

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].records, vec!["x", "y", "z"]);
    assert_eq!(batches[0].trigger, FlushTrigger::Drain);
    // Drained without waiting for the 5s window
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_stop_with_empty_buffer_emits_nothing() {
    let batcher: WindowedBatcher<u32> = WindowedBatcher::new(BatcherConfig::default());
    batcher.stop();

    let batches: Vec<_> = batcher.produce_batches().collect().await;
    assert!(batches.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let batcher = WindowedBatcher::new(BatcherConfig::default());
    let handle = batcher.handle();

    handle.ingest(1).await.unwrap();
    handle.ingest(2).await.unwrap();

    handle.stop();
    handle.stop();
    batcher.stop();

    assert!(handle.is_stopped());
    assert!(matches!(handle.ingest(3).await, Err(IngestError::Stopped(3))));

    let stats_before = batcher.stats();
    let batches: Vec<_> = batcher.produce_batches().collect().await;
    handle.stop();

    assert_eq!(sizes(&batches), vec![2]);
    assert_eq!(stats_before.records_ingested, 2);
    assert_eq!(handle.stats().drain_batches, 1);
    assert_eq!(handle.stats().batches_emitted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_stop_observed_within_poll_interval() {
    let config = BatcherConfig::default().with_idle_poll_interval(Duration::from_secs(1));
    let batcher: WindowedBatcher<u32> = WindowedBatcher::new(config);
    let handle = batcher.handle();
    let (_rx, consumer) = spawn_timed_consumer(batcher.produce_batches());

    sleep(Duration::from_secs(10)).await;
    let stopped_at = Instant::now();
    handle.stop();

    consumer.await.unwrap();
    assert!(stopped_at.elapsed() <= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_all_handles_is_implicit_stop() {
    let batcher = WindowedBatcher::new(BatcherConfig::default());
    let handle = batcher.handle();
    let (mut rx, consumer) = spawn_timed_consumer(batcher.produce_batches());

    handle.ingest("only").await.unwrap();
    drop(handle);

    consumer.await.unwrap();
    let (_, batch) = rx.recv().await.unwrap();
    assert_eq!(batch.records, vec!["only"]);
    assert_eq!(batch.trigger, FlushTrigger::Drain);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_token_stops_batcher() {
    let cancel = CancellationToken::new();
    let batcher = WindowedBatcher::with_cancellation(BatcherConfig::default(), cancel.clone());
    let handle = batcher.handle();
    let batches = batcher.produce_batches();

    handle.ingest(7).await.unwrap();
    cancel.cancel();

    assert!(handle.is_stopped());
    let batches: Vec<_> = batches.collect().await;
    assert_eq!(sizes(&batches), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_window_measured_from_last_flush() {
    let config = BatcherConfig::default().with_max_window(Duration::from_secs(1));
    let batcher = WindowedBatcher::new(config);
    let handle = batcher.handle();
    let start = Instant::now();
    let (mut rx, consumer) = spawn_timed_consumer(batcher.produce_batches());

    // Idle well past the window; the first record then closes immediately
    sleep(Duration::from_secs(3)).await;
    handle.ingest("late").await.unwrap();
    sleep(Duration::from_millis(10)).await;

    let (emitted_at, batch) = rx.try_recv().expect("expired window flushes on append");
    assert_eq!(batch.records, vec!["late"]);
    assert_eq!(batch.trigger, FlushTrigger::Time);
    assert!(emitted_at - start < Duration::from_millis(3010));

    // Next record starts a fresh window
    handle.ingest("next").await.unwrap();
    sleep(Duration::from_millis(500)).await;
    assert!(rx.try_recv().is_err());
    sleep(Duration::from_millis(600)).await;
    let (_, batch) = rx.try_recv().unwrap();
    assert_eq!(batch.records, vec!["next"]);

    handle.stop();
    consumer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_batch_size_one_emits_every_record() {
    let batcher = WindowedBatcher::new(BatcherConfig::default().with_max_batch_size(1));
    for i in 0..3 {
        batcher.ingest(i).await.unwrap();
    }
    batcher.stop();

    let batches: Vec<_> = batcher.produce_batches().collect().await;
    assert_eq!(sizes(&batches), vec![1, 1, 1]);
    assert!(batches.iter().all(|b| b.trigger == FlushTrigger::Size));
}

#[tokio::test]
async fn test_multiple_producers_keep_per_producer_order() {
    let config = BatcherConfig::default()
        .with_max_batch_size(16)
        .with_max_window(Duration::from_millis(50));
    let batcher = WindowedBatcher::new(config);

    let mut producers = Vec::new();
    for producer_id in 0..4u32 {
        let handle = batcher.handle();
        producers.push(tokio::spawn(async move {
            for i in 0..50u32 {
                handle.ingest((producer_id, i)).await.unwrap();
                if i % 10 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    let batches = batcher.produce_batches();
    let consumer = tokio::spawn(async move { batches.collect::<Vec<_>>().await });

    for producer in producers {
        producer.await.unwrap();
    }
    // Every handle is gone now, so the stream drains and ends
    let batches = consumer.await.unwrap();

    let records: Vec<(u32, u32)> = batches.iter().flat_map(|b| b.records.clone()).collect();
    assert_eq!(records.len(), 200);
    assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 16));

    for producer_id in 0..4u32 {
        let seen: Vec<u32> = records
            .iter()
            .filter(|(p, _)| *p == producer_id)
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_block_backpressure_delivers_everything() {
    let config = BatcherConfig::default()
        .with_max_batch_size(10)
        .with_backpressure(BackpressureStrategy::Block, Some(4));
    let batcher = WindowedBatcher::new(config);
    let handle = batcher.handle();
    let batches = batcher.produce_batches();

    let producer = tokio::spawn(async move {
        for i in 0u32..100 {
            handle.ingest(i).await.unwrap();
        }
        handle.stop();
        handle.stats()
    });

    let batches: Vec<_> = batches.collect().await;
    let stats = producer.await.unwrap();

    assert_eq!(stats.records_dropped, 0);
    assert_eq!(stats.records_rejected, 0);
    let flattened: Vec<u32> = batches.iter().flat_map(|b| b.records.clone()).collect();
    assert_eq!(flattened, (0..100).collect::<Vec<_>>());
    assert_eq!(sizes(&batches), vec![10; 10]);
}

#[tokio::test(start_paused = true)]
async fn test_drop_oldest_keeps_newest_records() {
    let config = BatcherConfig::default()
        .with_backpressure(BackpressureStrategy::DropOldest, Some(3));
    let batcher = WindowedBatcher::new(config);

    for i in 0u32..10 {
        batcher.ingest(i).await.unwrap();
    }
    batcher.stop();
    let stats = batcher.stats();

    let batches: Vec<_> = batcher.produce_batches().collect().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].records, vec![7, 8, 9]);
    assert_eq!(stats.records_dropped, 7);
    assert_eq!(stats.queue_depth, 3);
}

#[tokio::test(start_paused = true)]
async fn test_reject_surfaces_overflow_to_producer_only() {
    let config = BatcherConfig::default()
        .with_backpressure(BackpressureStrategy::Reject, Some(2));
    let batcher = WindowedBatcher::new(config);

    batcher.ingest("a").await.unwrap();
    batcher.try_ingest("b").unwrap();
    let err = batcher.ingest("c").await.unwrap_err();
    assert!(matches!(err, IngestError::QueueOverflow("c")));
    assert_eq!(err.into_inner(), "c");
    batcher.stop();

    let batches: Vec<_> = batcher.produce_batches().collect().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].records, vec!["a", "b"]);
}
