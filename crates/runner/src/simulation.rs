//! Market simulation runner

use agora_core::{ConsumerId, ProducerId, Product, Result, StockReport};
use agora_agents::{
    Consumer, ConsumerConfig, Directory, ItemSpec, Producer, ProducerConfig, Purchase,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Simulation configuration: how long to run and which agents to spawn.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub duration: Duration,
    pub producers: Vec<ProducerConfig>,
    pub consumers: Vec<ConsumerConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // Small default market: one producer with a three-product
        // magazine and two consumers shopping against it.
        let catalog = vec![
            ItemSpec::new(
                Product::new(0, "Iron ingot").with_tags(["metal", "smelted"]),
                20.0,
                50,
                100,
                4,
                2,
            ),
            ItemSpec::new(
                Product::new(1, "Coal").with_tags(["fuel", "raw"]),
                20.0,
                50,
                100,
                4,
                2,
            ),
            ItemSpec::new(
                Product::new(2, "Copper wire").with_tags(["metal"]),
                20.0,
                50,
                100,
                4,
                2,
            ),
        ];

        Self {
            duration: Duration::from_secs(10),
            producers: vec![ProducerConfig {
                id: ProducerId::new(2),
                tick_interval: Duration::from_millis(250),
                items: catalog,
                ..Default::default()
            }],
            consumers: vec![
                ConsumerConfig {
                    id: ConsumerId::new(1),
                    tick_interval: Duration::from_millis(100),
                    ..Default::default()
                },
                ConsumerConfig {
                    id: ConsumerId::new(2),
                    tick_interval: Duration::from_millis(150),
                    ..Default::default()
                },
            ],
        }
    }
}

/// Everything the agents reported while the simulation ran.
#[derive(Debug, Clone, Default)]
pub struct SimulationResults {
    /// Per-item stock reports, one per producer item per tick.
    pub reports: Vec<StockReport>,
    /// Completed purchases in completion order.
    pub purchases: Vec<Purchase>,
}

impl SimulationResults {
    pub fn total_spent(&self) -> f64 {
        self.purchases
            .iter()
            .map(|p| p.unit_price * p.quantity as f64)
            .sum()
    }

    pub fn total_units_sold(&self) -> u32 {
        self.purchases.iter().map(|p| p.quantity).sum()
    }
}

/// A configured market simulation.
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Builds the market, runs it for the configured duration and shuts
    /// every agent down deterministically.
    pub async fn run(self) -> Result<SimulationResults> {
        let directory = Arc::new(Directory::new());
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let (purchase_tx, mut purchase_rx) = mpsc::unbounded_channel();

        let mut producers = Vec::with_capacity(self.config.producers.len());
        for config in self.config.producers {
            producers.push(Producer::spawn(config, &directory, Some(report_tx.clone()))?);
        }
        drop(report_tx);

        let mut consumers = Vec::with_capacity(self.config.consumers.len());
        for config in self.config.consumers {
            consumers.push(Consumer::spawn(config, &directory, Some(purchase_tx.clone())));
        }
        drop(purchase_tx);

        log::info!(
            "simulation: {} producers, {} consumers, running for {:?}",
            producers.len(),
            consumers.len(),
            self.config.duration
        );
        tokio::time::sleep(self.config.duration).await;

        for handle in consumers {
            handle.shutdown();
        }
        for handle in producers {
            handle.shutdown();
        }
        debug_assert!(directory.is_empty());

        let mut results = SimulationResults::default();
        while let Ok(report) = report_rx.try_recv() {
            results.reports.push(report);
        }
        while let Ok(purchase) = purchase_rx.try_recv() {
            results.purchases.push(purchase);
        }

        log::info!(
            "simulation: done, {} reports, {} purchases, {:.2} spent",
            results.reports.len(),
            results.purchases.len(),
            results.total_spent()
        );
        Ok(results)
    }
}
