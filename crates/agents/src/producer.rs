//! Producer agent
//!
//! A producer owns a magazine of [`ProducerItem`]s. Each tick it runs
//! batch production, reprices every item through its pricing strategy
//! and emits one stock report per item. Consumers only ever see snapshot
//! copies of the magazine; the single transactional entry point into it
//! is [`Producer::sell`].
//!
//! Price and quantity are guarded by separate locks on each item, so a
//! consumer reading prices never contends with another one buying, and
//! the stock check plus decrement inside `sell` form one critical
//! section that cannot oversell under racing purchases.

use crate::directory::Directory;
use crate::pricing::{PricingKind, PricingStrategy};
use agora_core::{
    ItemFilter, MarketError, ProducerId, Product, ProductId, Result, StockItem, StockReport,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Static description of one magazine entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSpec {
    pub product: Product,
    /// Reference point for pricing strategies.
    pub base_price: f64,
    /// Starting unit price; defaults to the base price.
    pub initial_price: Option<f64>,
    pub initial_quantity: u32,
    pub max_storage: u32,
    /// Units added to stock when a batch completes.
    pub batch_size: u32,
    /// Ticks of lead time before a batch completes.
    pub turns_to_produce_batch: u32,
}

impl ItemSpec {
    pub fn new(
        product: Product,
        base_price: f64,
        initial_quantity: u32,
        max_storage: u32,
        batch_size: u32,
        turns_to_produce_batch: u32,
    ) -> Self {
        Self {
            product,
            base_price,
            initial_price: None,
            initial_quantity,
            max_storage,
            batch_size,
            turns_to_produce_batch,
        }
    }
}

/// Configuration surface of a producer agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub id: ProducerId,
    /// Interval between ticks of the spawned agent task.
    pub tick_interval: Duration,
    pub items: Vec<ItemSpec>,
    pub pricing: PricingKind,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            id: ProducerId::new(1),
            tick_interval: Duration::from_millis(1000),
            items: Vec::new(),
            pricing: PricingKind::default(),
        }
    }
}

/// One magazine entry: a stock item extended with production and
/// pricing parameters.
///
/// Mutable state is split into independent guards. `price` takes a
/// read-write lock because it is read far more often than written;
/// `quantity` takes a mutex because every access to it is part of a
/// check-then-act sequence.
struct ProducerItem {
    product: Product,
    base_price: f64,
    max_storage: u32,
    batch_size: u32,
    turns_to_produce_batch: u32,
    price: RwLock<f64>,
    quantity: Mutex<u32>,
    turn_counter: Mutex<u32>,
}

impl ProducerItem {
    fn from_spec(spec: ItemSpec) -> Self {
        let price = spec.initial_price.unwrap_or(spec.base_price);
        Self {
            product: spec.product,
            base_price: spec.base_price,
            max_storage: spec.max_storage,
            batch_size: spec.batch_size,
            turns_to_produce_batch: spec.turns_to_produce_batch,
            price: RwLock::new(price),
            quantity: Mutex::new(spec.initial_quantity.min(spec.max_storage)),
            turn_counter: Mutex::new(0),
        }
    }

    fn snapshot(&self) -> StockItem {
        // Take the guards one at a time; holding both here could form a
        // cycle with `sell`, which locks quantity before reading price.
        let quantity = *self.quantity.lock();
        let price = *self.price.read();
        StockItem::new(self.product.clone(), price, quantity)
    }

    /// Advances batch production by one turn.
    ///
    /// Lead time only accrues while there is storage space; a completed
    /// batch is clamped to capacity.
    fn produce(&self) {
        let mut quantity = self.quantity.lock();
        if *quantity >= self.max_storage {
            return;
        }
        let mut counter = self.turn_counter.lock();
        *counter += 1;
        if *counter >= self.turns_to_produce_batch {
            *counter = 0;
            *quantity = (*quantity + self.batch_size).min(self.max_storage);
        }
    }

    fn reprice(&self, strategy: &dyn PricingStrategy) {
        let fill_factor = if self.max_storage == 0 {
            1.0
        } else {
            *self.quantity.lock() as f64 / self.max_storage as f64
        };
        let mut price = self.price.write();
        *price = strategy.price(fill_factor, self.base_price, *price);
    }

    /// Atomically checks stock and debits it.
    ///
    /// The returned snapshot carries the quantity sold at the
    /// pre-decrement unit price.
    fn sell(&self, requested: u32) -> Result<StockItem> {
        let mut quantity = self.quantity.lock();
        if requested > *quantity {
            return Err(MarketError::InsufficientStock {
                requested,
                available: *quantity,
            });
        }
        let unit_price = *self.price.read();
        *quantity -= requested;
        Ok(StockItem::new(self.product.clone(), unit_price, requested))
    }

    fn report(&self, producer: ProducerId) -> StockReport {
        let quantity = *self.quantity.lock();
        let price = *self.price.read();
        StockReport::now(
            producer,
            self.product.id(),
            self.product.name(),
            price,
            self.base_price,
            quantity,
            self.max_storage,
        )
    }
}

/// A producer agent.
///
/// The magazine is exclusively owned: queries return defensive copies
/// and `sell` is the only mutation reachable from outside.
pub struct Producer {
    id: ProducerId,
    magazine: Vec<ProducerItem>,
    pricing: Arc<dyn PricingStrategy>,
    report_tx: Option<UnboundedSender<StockReport>>,
}

impl Producer {
    pub fn new(config: ProducerConfig, report_tx: Option<UnboundedSender<StockReport>>) -> Self {
        Self {
            id: config.id,
            magazine: config.items.into_iter().map(ProducerItem::from_spec).collect(),
            pricing: config.pricing.strategy(),
            report_tx,
        }
    }

    /// Replaces the pricing strategy. Any `Fn(f64, f64, f64) -> f64`
    /// qualifies.
    pub fn with_pricing(mut self, pricing: Arc<dyn PricingStrategy>) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn id(&self) -> ProducerId {
        self.id
    }

    /// One production/repricing turn. Invoked by the spawned agent task,
    /// but independently callable so tests can drive the producer
    /// deterministically.
    pub fn tick(&self) {
        for item in &self.magazine {
            item.produce();
            item.reprice(self.pricing.as_ref());
        }
        for item in &self.magazine {
            let report = item.report(self.id);
            log::debug!("producer {}: {report}", self.id);
            if let Some(tx) = &self.report_tx {
                let _ = tx.send(report);
            }
        }
    }

    /// Defensive copy of the offer for `product_id`, if stocked.
    pub fn item(&self, product_id: ProductId) -> Option<StockItem> {
        self.magazine
            .iter()
            .find(|item| item.product.id() == product_id)
            .map(ProducerItem::snapshot)
    }

    /// Filtered defensive copies of the current offers.
    pub fn items(&self, filter: &ItemFilter) -> Vec<StockItem> {
        self.magazine
            .iter()
            .map(ProducerItem::snapshot)
            .filter(|snapshot| filter.matches(snapshot))
            .collect()
    }

    /// Sells `quantity` units of `product_id`.
    ///
    /// Fails with `NotFound` if the product is not stocked and with
    /// `InsufficientStock` if the request exceeds current stock; in both
    /// cases the magazine is unchanged. On success the stock is debited
    /// and the returned snapshot is priced at the pre-decrement unit
    /// price.
    pub fn sell(&self, product_id: ProductId, quantity: u32) -> Result<StockItem> {
        let item = self
            .magazine
            .iter()
            .find(|item| item.product.id() == product_id)
            .ok_or(MarketError::NotFound(product_id))?;
        let sold = item.sell(quantity)?;
        log::info!(
            "producer {}: sold {} x product {} at {:.2}",
            self.id,
            sold.quantity,
            product_id,
            sold.price,
        );
        Ok(sold)
    }

    /// Registers the producer in the directory and starts its tick task.
    ///
    /// Registration failure (duplicate id) aborts the spawn; nothing is
    /// left running or registered.
    pub fn spawn(
        config: ProducerConfig,
        directory: &Arc<Directory>,
        report_tx: Option<UnboundedSender<StockReport>>,
    ) -> Result<ProducerHandle> {
        let tick_interval = config.tick_interval;
        let producer = Arc::new(Producer::new(config, report_tx));
        directory.register(Arc::clone(&producer))?;

        let task = tokio::spawn({
            let producer = Arc::clone(&producer);
            async move {
                let mut ticker = tokio::time::interval(tick_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    producer.tick();
                }
            }
        });

        Ok(ProducerHandle {
            producer,
            directory: Arc::clone(directory),
            task,
        })
    }
}

/// Handle to a spawned producer.
///
/// `shutdown` stops the tick task and unregisters deterministically;
/// dropping the handle without calling it only aborts the task and is a
/// last-resort backstop, not the intended lifecycle.
pub struct ProducerHandle {
    producer: Arc<Producer>,
    directory: Arc<Directory>,
    task: JoinHandle<()>,
}

impl ProducerHandle {
    pub fn producer(&self) -> &Arc<Producer> {
        &self.producer
    }

    /// Stops the tick task and removes the producer from the directory.
    pub fn shutdown(self) {
        self.task.abort();
        self.directory.unregister(self.producer.id());
        log::info!("producer {}: stopped", self.producer.id());
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("producer_id", &self.producer.id())
            .finish_non_exhaustive()
    }
}
