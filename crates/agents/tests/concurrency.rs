//! Concurrency tests for the agent engine
//!
//! These exercise the guarantees the in-process market relies on:
//! `sell` never oversells under racing buyers, and the directory stays
//! consistent under concurrent registration, removal and listing.

use agora_core::{MarketError, ProducerId, Product, ProductId};
use agora_agents::{
    Consumer, ConsumerConfig, Directory, ItemSpec, Producer, ProducerConfig,
};
use std::sync::Arc;
use std::time::Duration;

fn stocked_producer(id: u32, quantity: u32) -> Arc<Producer> {
    let config = ProducerConfig {
        id: ProducerId::new(id),
        items: vec![ItemSpec::new(
            Product::new(1, "Iron ingot"),
            20.0,
            quantity,
            quantity.max(1),
            4,
            2,
        )],
        ..Default::default()
    };
    Arc::new(Producer::new(config, None))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn racing_sells_never_oversell() {
    // N buyers of one unit each against N-1 units of stock: exactly one
    // must lose, and the stock must land on zero, never below.
    const BUYERS: u32 = 32;
    let producer = stocked_producer(1, BUYERS - 1);

    let mut tasks = Vec::new();
    for _ in 0..BUYERS {
        let producer = Arc::clone(&producer);
        tasks.push(tokio::spawn(async move {
            producer.sell(ProductId::new(1), 1)
        }));
    }

    let mut failures = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(sold) => {
                assert_eq!(sold.quantity, 1);
                assert_eq!(sold.price, 20.0);
            }
            Err(MarketError::InsufficientStock { .. }) => failures += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(failures, 1);
    assert_eq!(producer.item(ProductId::new(1)).unwrap().quantity, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_registration_and_listing_stay_consistent() {
    let directory = Arc::new(Directory::new());

    let mut tasks = Vec::new();
    for id in 0..16u32 {
        let directory = Arc::clone(&directory);
        tasks.push(tokio::spawn(async move {
            directory.register(stocked_producer(id, 10)).unwrap();
            // Everyone lists while others are still registering.
            for _ in 0..50 {
                let snapshot = directory.producers();
                let mut ids: Vec<ProducerId> =
                    snapshot.iter().map(|p| p.id()).collect();
                ids.dedup();
                assert_eq!(ids.len(), snapshot.len(), "duplicate id observed");
            }
            if id % 2 == 0 {
                directory.unregister(ProducerId::new(id));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(directory.len(), 8);
    for producer in directory.producers() {
        assert_eq!(producer.id().0 % 2, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn duplicate_registration_races_admit_exactly_one() {
    let directory = Arc::new(Directory::new());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let directory = Arc::clone(&directory);
        tasks.push(tokio::spawn(async move {
            directory.register(stocked_producer(7, 10)).is_ok()
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(directory.len(), 1);
}

#[tokio::test]
async fn spawn_registers_and_shutdown_unregisters() {
    let directory = Arc::new(Directory::new());
    let config = ProducerConfig {
        id: ProducerId::new(3),
        tick_interval: Duration::from_millis(10),
        items: vec![ItemSpec::new(Product::new(1, "Iron ingot"), 20.0, 0, 100, 4, 1)],
        ..Default::default()
    };

    let handle = Producer::spawn(config.clone(), &directory, None).unwrap();
    assert_eq!(directory.len(), 1);

    // A second spawn under the same id must fail and leave nothing behind.
    let err = Producer::spawn(config, &directory, None).unwrap_err();
    assert_eq!(err, MarketError::DuplicateIdentity(ProducerId::new(3)));
    assert_eq!(directory.len(), 1);

    // The tick task is live: stock appears without anyone calling tick().
    tokio::time::sleep(Duration::from_millis(100)).await;
    let producer = directory.get(ProducerId::new(3)).unwrap();
    assert!(producer.item(ProductId::new(1)).unwrap().quantity > 0);

    handle.shutdown();
    assert!(directory.is_empty());
}

#[tokio::test]
async fn spawned_consumer_buys_from_spawned_producer() {
    let directory = Arc::new(Directory::new());
    let producer_config = ProducerConfig {
        id: ProducerId::new(1),
        tick_interval: Duration::from_millis(5),
        items: vec![ItemSpec::new(Product::new(1, "Iron ingot"), 20.0, 100, 100, 4, 2)],
        ..Default::default()
    };
    let producer = Producer::spawn(producer_config, &directory, None).unwrap();

    let (purchase_tx, mut purchase_rx) = tokio::sync::mpsc::unbounded_channel();
    let consumer_config = ConsumerConfig {
        tick_interval: Duration::from_millis(5),
        price_fluctuation: 0.2,
        wait_turns: (1, 1),
        seed: Some(7),
        ..Default::default()
    };
    let consumer = Consumer::spawn(consumer_config, &directory, Some(purchase_tx));

    let purchase = tokio::time::timeout(Duration::from_secs(5), purchase_rx.recv())
        .await
        .expect("no purchase within the deadline")
        .expect("purchase channel closed");
    assert_eq!(purchase.product_id, ProductId::new(1));
    assert!(purchase.quantity >= 1);

    consumer.shutdown();
    producer.shutdown();
}
