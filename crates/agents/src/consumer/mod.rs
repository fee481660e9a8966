//! Consumer agent
//!
//! A consumer runs a turn-based purchase state machine. Each tick
//! advances exactly one stage (or burns one turn of a randomized wait):
//! pick a product from the market catalog, derive an acceptable price
//! and quantity from the current offers, collect and score candidate
//! sellers, then contact the best one and attempt the purchase.
//!
//! Market snapshots can be stale by the time the consumer acts on them,
//! so the contact stage re-validates the chosen offer and treats
//! rejection as a normal outcome: one in-place retry, one more research
//! cycle, then the order is abandoned and the cycle starts over.

mod order;
mod state;

pub use order::Order;
pub use state::{ConsumerState, Stage};

use crate::directory::Directory;
use agora_core::{
    ConsumerId, ItemFilter, MarketError, ProducerId, ProductId, Result, StockItem,
};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Extra dealer-search rounds allowed after a failed contact before the
/// order is abandoned.
const MAX_RESEARCH_CYCLES: u32 = 1;

/// Configuration surface of a consumer agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub id: ConsumerId,
    /// Interval between ticks of the spawned agent task.
    pub tick_interval: Duration,
    /// Half-width of the acceptable-price band around the market
    /// average, as a fraction of that average. Zero makes the limit
    /// exactly the average price.
    pub price_fluctuation: f64,
    /// Spread of the desired quantity around the market average.
    pub quantity_fluctuation: f64,
    pub initial_funds: f64,
    /// Inclusive range for randomized wait lengths, in ticks.
    pub wait_turns: (u32, u32),
    /// RNG seed for reproducible runs; entropy-seeded if unset.
    pub seed: Option<u64>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            id: ConsumerId::new(1),
            tick_interval: Duration::from_millis(1000),
            price_fluctuation: 0.1,
            quantity_fluctuation: 0.3,
            initial_funds: 10_000.0,
            wait_turns: (1, 3),
            seed: None,
        }
    }
}

/// Notification of a completed purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub consumer: ConsumerId,
    pub producer: ProducerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: f64,
}

/// A consumer agent.
pub struct Consumer {
    id: ConsumerId,
    directory: Arc<Directory>,
    price_fluctuation: f64,
    quantity_fluctuation: f64,
    wait_turns: (u32, u32),
    funds: f64,
    rng: StdRng,
    state: ConsumerState,
    order: Option<Order>,
    catalog: BTreeMap<ProductId, agora_core::Product>,
    research_cycles: u32,
    /// Set when an inner wait inside the contact stage has elapsed, i.e.
    /// the next rejection is the second consecutive one.
    retry_window_elapsed: bool,
    purchase_tx: Option<UnboundedSender<Purchase>>,
}

impl Consumer {
    pub fn new(
        config: ConsumerConfig,
        directory: Arc<Directory>,
        purchase_tx: Option<UnboundedSender<Purchase>>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            id: config.id,
            directory,
            price_fluctuation: config.price_fluctuation,
            quantity_fluctuation: config.quantity_fluctuation,
            wait_turns: config.wait_turns,
            funds: config.initial_funds,
            rng,
            state: ConsumerState::ProductSelection,
            order: None,
            catalog: BTreeMap::new(),
            research_cycles: 0,
            retry_window_elapsed: false,
            purchase_tx,
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// The order of the current (or just-finished) purchase cycle.
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    /// Runs one turn of the state machine.
    ///
    /// Every market-level failure is handled internally as a state
    /// transition; an `Err` here is an invariant violation and means the
    /// current purchase cycle must be aborted via [`Consumer::recover`].
    pub fn step(&mut self) -> Result<()> {
        match self.state {
            ConsumerState::ProductSelection => self.select_product(),
            ConsumerState::DetailsSelection => self.select_details(),
            ConsumerState::DealerSearch => self.search_dealers(),
            ConsumerState::DealerContact => self.contact_dealer(),
            ConsumerState::RandWait {
                turns_remaining,
                next,
                inner,
            } => {
                self.wait_turn(turns_remaining, next, inner);
                Ok(())
            }
            ConsumerState::Unknown => Err(MarketError::InvariantViolation(format!(
                "consumer {} stepped in the unknown state",
                self.id
            ))),
        }
    }

    /// Resets the machine after a fatal cycle error.
    pub fn recover(&mut self) {
        self.order = None;
        self.research_cycles = 0;
        self.retry_window_elapsed = false;
        self.state = ConsumerState::ProductSelection;
    }

    fn select_product(&mut self) -> Result<()> {
        self.refresh_catalog();
        if self.catalog.is_empty() {
            log::debug!(
                "consumer {}: market is empty, staying in product selection",
                self.id
            );
            return Ok(());
        }

        let index = self.rng.gen_range(0..self.catalog.len());
        let Some(product) = self.catalog.values().nth(index).cloned() else {
            return Err(MarketError::InvariantViolation(format!(
                "consumer {}: catalog index {index} out of range",
                self.id
            )));
        };
        log::debug!(
            "consumer {}: selected product {} ({})",
            self.id,
            product.id(),
            product.name()
        );

        let mut order = Order::new(product.id());
        order.product = Some(product);
        self.order = Some(order);
        self.enter_wait(Stage::DetailsSelection, false);
        Ok(())
    }

    fn select_details(&mut self) -> Result<()> {
        let product_id = self.current_order_product()?;
        let offers: Vec<StockItem> = self
            .directory
            .producers()
            .iter()
            .filter_map(|producer| producer.item(product_id))
            .collect();

        if offers.is_empty() {
            log::debug!(
                "consumer {}: no offers left for product {product_id}, abandoning",
                self.id
            );
            self.return_to_selection();
            return Ok(());
        }

        let avg_price = offers.iter().map(|o| o.price).sum::<f64>() / offers.len() as f64;
        let avg_quantity =
            offers.iter().map(|o| o.quantity as f64).sum::<f64>() / offers.len() as f64;
        if avg_quantity.round() < 1.0 {
            log::debug!(
                "consumer {}: product {product_id} is effectively out of stock, abandoning",
                self.id
            );
            self.return_to_selection();
            return Ok(());
        }

        let swing = self.rng.gen_range(-1.0..=1.0) * self.price_fluctuation * avg_price;
        let max_unit_price = avg_price + swing;

        let q = self.quantity_fluctuation;
        let low = ((1.0 - q) * avg_quantity).floor() as u32;
        let high = ((1.0 + q) * avg_quantity).floor() as u32;
        let upper = if high > low {
            self.rng.gen_range(low..=high)
        } else {
            low
        };
        let quantity = self.rng.gen_range(1..=upper.max(2));

        if let Some(order) = self.order.as_mut() {
            order.max_unit_price = max_unit_price;
            order.quantity = quantity;
        }
        log::debug!(
            "consumer {}: wants {quantity} x product {product_id} at <= {max_unit_price:.2}",
            self.id
        );
        self.enter_wait(Stage::DealerSearch, false);
        Ok(())
    }

    fn search_dealers(&mut self) -> Result<()> {
        let id = self.id;
        let product_id = self.current_order_product()?;

        let mut dealers = BTreeMap::new();
        for producer in self.directory.producers() {
            if let Some(offer) = producer.item(product_id) {
                dealers.insert(producer.id(), offer);
            }
        }
        if dealers.is_empty() {
            log::debug!("consumer {id}: nobody stocks product {product_id}, abandoning");
            self.return_to_selection();
            return Ok(());
        }

        let chosen = {
            let order = match self.order.as_mut() {
                Some(order) => order,
                None => {
                    return Err(MarketError::InvariantViolation(format!(
                        "consumer {id}: dealer search without an active order"
                    )));
                }
            };
            order.dealers = dealers;
            let mut best = order.best_by_score();
            if best.is_none() {
                order.relax();
                log::debug!(
                    "consumer {id}: no eligible dealer, relaxed to {} units at <= {:.2}",
                    order.quantity,
                    order.max_unit_price
                );
                best = order.best_by_score();
            }
            best
        };

        match chosen {
            Some(dealer) => {
                if let Some(order) = self.order.as_mut() {
                    order.best_dealer = Some(dealer);
                }
                log::debug!("consumer {id}: best dealer for product {product_id} is {dealer}");
                self.enter_wait(Stage::DealerContact, false);
            }
            None => {
                log::warn!(
                    "consumer {id}: no dealer fits product {product_id} even after relaxing, \
                     abandoning order"
                );
                self.return_to_selection();
            }
        }
        Ok(())
    }

    fn contact_dealer(&mut self) -> Result<()> {
        let id = self.id;
        let (product_id, desired, max_price, dealer) = match self.order.as_ref() {
            Some(order) => match order.best_dealer {
                Some(dealer) => (
                    order.product_id,
                    order.quantity,
                    order.max_unit_price,
                    dealer,
                ),
                None => {
                    return Err(MarketError::InvariantViolation(format!(
                        "consumer {id}: dealer contact without a selected dealer"
                    )));
                }
            },
            None => {
                return Err(MarketError::InvariantViolation(format!(
                    "consumer {id}: dealer contact without an active order"
                )));
            }
        };

        // The offer was scored against a snapshot; price and stock may
        // have moved since, and our funds bound the deal exactly like
        // the dealer's stock does.
        let producer = self.directory.get(dealer);
        let offer = producer.as_ref().and_then(|p| p.item(product_id));
        let rejection = match &offer {
            None => Some(MarketError::NotFound(product_id)),
            Some(o) if o.quantity < desired => Some(MarketError::InsufficientStock {
                requested: desired,
                available: o.quantity,
            }),
            Some(o) if o.price > max_price => Some(MarketError::PriceExceedsLimit {
                offered: o.price,
                limit: max_price,
            }),
            Some(o) if o.price * desired as f64 > self.funds => {
                Some(MarketError::InsufficientFunds {
                    needed: o.price * desired as f64,
                    available: self.funds,
                })
            }
            Some(_) => None,
        };
        if let Some(reason) = rejection {
            self.contact_failed(dealer, reason);
            return Ok(());
        }

        let Some(producer) = producer else {
            return Err(MarketError::InvariantViolation(format!(
                "consumer {id}: producer {dealer} vanished mid-purchase"
            )));
        };

        match producer.sell(product_id, desired) {
            Ok(sold) => {
                let cost = sold.price * sold.quantity as f64;
                self.funds -= cost;
                if let Some(order) = self.order.as_mut() {
                    order.realized = true;
                }
                log::info!(
                    "consumer {id}: bought {} x product {product_id} from producer {dealer} \
                     at {:.2} ({cost:.2} total, {:.2} funds left)",
                    sold.quantity,
                    sold.price,
                    self.funds
                );
                if let Some(tx) = &self.purchase_tx {
                    let _ = tx.send(Purchase {
                        consumer: id,
                        producer: dealer,
                        product_id,
                        quantity: sold.quantity,
                        unit_price: sold.price,
                    });
                }
            }
            Err(e) => {
                // Lost the race against another consumer. Not an error
                // condition, just a failed cycle.
                log::warn!("consumer {id}: purchase from producer {dealer} failed: {e}");
            }
        }
        self.return_to_selection();
        Ok(())
    }

    /// Bounded backoff for a rejected dealer contact: wait and retry the
    /// same dealer once, then run one more dealer search, then abandon.
    fn contact_failed(&mut self, dealer: ProducerId, reason: MarketError) {
        let id = self.id;
        if !self.retry_window_elapsed {
            log::debug!(
                "consumer {id}: offer from producer {dealer} no longer acceptable ({reason}); \
                 waiting before one retry"
            );
            self.enter_wait(Stage::DealerContact, true);
        } else if self.research_cycles < MAX_RESEARCH_CYCLES {
            self.retry_window_elapsed = false;
            self.research_cycles += 1;
            log::debug!(
                "consumer {id}: retry against producer {dealer} failed ({reason}); \
                 searching for another dealer"
            );
            self.enter_wait(Stage::DealerSearch, false);
        } else {
            log::warn!("consumer {id}: giving up on the current order ({reason})");
            self.return_to_selection();
        }
    }

    fn return_to_selection(&mut self) {
        self.research_cycles = 0;
        self.retry_window_elapsed = false;
        self.enter_wait(Stage::ProductSelection, false);
    }

    fn wait_turn(&mut self, turns_remaining: u32, next: Stage, inner: bool) {
        if turns_remaining <= 1 {
            if inner {
                self.retry_window_elapsed = true;
            }
            self.state = next.into();
        } else {
            self.state = ConsumerState::RandWait {
                turns_remaining: turns_remaining - 1,
                next,
                inner,
            };
        }
    }

    fn enter_wait(&mut self, next: Stage, inner: bool) {
        let (min, max) = self.wait_turns;
        let turns = if max > min {
            self.rng.gen_range(min..=max)
        } else {
            min
        };
        self.state = ConsumerState::RandWait {
            turns_remaining: turns.max(1),
            next,
            inner,
        };
    }

    fn refresh_catalog(&mut self) {
        self.catalog.clear();
        let filter = ItemFilter::any();
        for producer in self.directory.producers() {
            for offer in producer.items(&filter) {
                self.catalog.entry(offer.product.id()).or_insert(offer.product);
            }
        }
    }

    fn current_order_product(&self) -> Result<ProductId> {
        self.order.as_ref().map(|o| o.product_id).ok_or_else(|| {
            MarketError::InvariantViolation(format!(
                "consumer {}: stage entered without an active order",
                self.id
            ))
        })
    }

    /// Starts the consumer's tick task.
    pub fn spawn(
        config: ConsumerConfig,
        directory: &Arc<Directory>,
        purchase_tx: Option<UnboundedSender<Purchase>>,
    ) -> ConsumerHandle {
        let id = config.id;
        let tick_interval = config.tick_interval;
        let mut consumer = Consumer::new(config, Arc::clone(directory), purchase_tx);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = consumer.step() {
                    log::error!("consumer {}: {e}; aborting this purchase cycle", consumer.id());
                    consumer.recover();
                }
            }
        });
        ConsumerHandle { id, task }
    }
}

/// Handle to a spawned consumer; `shutdown` stops its tick task.
pub struct ConsumerHandle {
    id: ConsumerId,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn shutdown(self) {
        self.task.abort();
        log::info!("consumer {}: stopped", self.id);
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::{ItemSpec, Producer, ProducerConfig};
    use agora_core::Product;
    use approx::assert_relative_eq;

    fn market_with_producer(price: f64, quantity: u32) -> Arc<Directory> {
        let directory = Arc::new(Directory::new());
        let config = ProducerConfig {
            id: ProducerId::new(1),
            items: vec![ItemSpec {
                product: Product::new(1, "Iron ingot"),
                base_price: price,
                initial_price: Some(price),
                initial_quantity: quantity,
                max_storage: quantity.max(1),
                batch_size: 4,
                turns_to_produce_batch: 2,
            }],
            ..Default::default()
        };
        directory
            .register(Arc::new(Producer::new(config, None)))
            .unwrap();
        directory
    }

    fn deterministic_consumer(directory: Arc<Directory>, funds: f64) -> Consumer {
        let config = ConsumerConfig {
            id: ConsumerId::new(1),
            price_fluctuation: 0.0,
            quantity_fluctuation: 0.0,
            initial_funds: funds,
            wait_turns: (1, 1),
            seed: Some(42),
            ..Default::default()
        };
        Consumer::new(config, directory, None)
    }

    #[test]
    fn empty_market_stays_in_product_selection() {
        let directory = Arc::new(Directory::new());
        let mut consumer = deterministic_consumer(directory, 100.0);

        for _ in 0..20 {
            consumer.step().unwrap();
            assert_eq!(consumer.state(), ConsumerState::ProductSelection);
        }
        assert!(consumer.order().is_none());
    }

    #[test]
    fn zero_fluctuation_exercises_the_relaxation_branch() {
        // With zero price fluctuation the limit equals the offer price
        // exactly, and eligibility is strict, so no dealer qualifies
        // until the one-shot 5% relaxation fires.
        let directory = market_with_producer(20.0, 100);
        let producer = directory.get(ProducerId::new(1)).unwrap();
        let mut consumer = deterministic_consumer(Arc::clone(&directory), 10_000.0);

        let mut realized = false;
        for _ in 0..50 {
            consumer.step().unwrap();
            if consumer.order().map(|o| o.realized).unwrap_or(false) {
                realized = true;
                break;
            }
        }
        assert!(realized, "purchase never completed");

        let order = consumer.order().unwrap();
        assert_relative_eq!(order.max_unit_price, 21.0, epsilon = 1e-9);
        assert!(order.quantity >= 1);
        assert_relative_eq!(
            consumer.funds(),
            10_000.0 - 20.0 * order.quantity as f64,
            epsilon = 1e-9
        );
        let remaining = producer.item(ProductId::new(1)).unwrap().quantity;
        assert_eq!(remaining, 100 - order.quantity);
    }

    #[test]
    fn insufficient_funds_never_buys_and_never_crashes() {
        let directory = market_with_producer(20.0, 100);
        let producer = directory.get(ProducerId::new(1)).unwrap();
        let mut consumer = deterministic_consumer(Arc::clone(&directory), 5.0);

        for _ in 0..200 {
            consumer.step().unwrap();
        }
        assert_relative_eq!(consumer.funds(), 5.0);
        assert_eq!(producer.item(ProductId::new(1)).unwrap().quantity, 100);
        assert!(!consumer.order().map(|o| o.realized).unwrap_or(false));
    }

    #[test]
    fn producer_vanishing_mid_cycle_abandons_the_order() {
        let directory = market_with_producer(20.0, 100);
        let mut consumer = deterministic_consumer(Arc::clone(&directory), 10_000.0);

        // Step until the order exists, then pull the producer out.
        for _ in 0..3 {
            consumer.step().unwrap();
        }
        assert!(consumer.order().is_some());
        directory.unregister(ProducerId::new(1));

        for _ in 0..50 {
            consumer.step().unwrap();
        }
        assert_eq!(consumer.state(), ConsumerState::ProductSelection);
        assert!(!consumer.order().map(|o| o.realized).unwrap_or(false));
    }

    #[test]
    fn rejected_contact_retries_then_researches_then_abandons() {
        let directory = market_with_producer(20.0, 100);
        let mut consumer = deterministic_consumer(directory, 10_000.0);

        // Force a contact against an offer that can never be accepted:
        // the limit price sits below the dealer's price.
        let mut order = Order::new(ProductId::new(1));
        order.quantity = 5;
        order.max_unit_price = 10.0;
        order.best_dealer = Some(ProducerId::new(1));
        consumer.order = Some(order);
        consumer.state = ConsumerState::DealerContact;

        // First rejection waits inside the stage.
        consumer.step().unwrap();
        assert!(matches!(
            consumer.state(),
            ConsumerState::RandWait {
                next: Stage::DealerContact,
                inner: true,
                ..
            }
        ));

        // Wait elapses, retry fails, falls back to dealer search.
        consumer.step().unwrap();
        assert_eq!(consumer.state(), ConsumerState::DealerContact);
        consumer.step().unwrap();
        assert!(matches!(
            consumer.state(),
            ConsumerState::RandWait {
                next: Stage::DealerSearch,
                ..
            }
        ));

        // The search relaxes to 10.50 which still excludes the 20.0
        // offer, so the order is abandoned.
        consumer.step().unwrap();
        assert_eq!(consumer.state(), ConsumerState::DealerSearch);
        consumer.step().unwrap();
        assert!(matches!(
            consumer.state(),
            ConsumerState::RandWait {
                next: Stage::ProductSelection,
                ..
            }
        ));
    }

    #[test]
    fn inner_wait_completion_opens_the_retry_window() {
        let directory = Arc::new(Directory::new());
        let mut consumer = deterministic_consumer(directory, 100.0);
        consumer.order = Some(Order::new(ProductId::new(1)));
        consumer.state = ConsumerState::RandWait {
            turns_remaining: 2,
            next: Stage::DealerContact,
            inner: true,
        };

        consumer.step().unwrap();
        assert!(!consumer.retry_window_elapsed);
        consumer.step().unwrap();
        assert!(consumer.retry_window_elapsed);
        assert_eq!(consumer.state(), ConsumerState::DealerContact);
    }

    #[test]
    fn contact_without_dealer_is_an_invariant_violation() {
        let directory = Arc::new(Directory::new());
        let mut consumer = deterministic_consumer(directory, 100.0);
        consumer.order = Some(Order::new(ProductId::new(1)));
        consumer.state = ConsumerState::DealerContact;

        let err = consumer.step().unwrap_err();
        assert!(matches!(err, MarketError::InvariantViolation(_)));

        consumer.recover();
        assert_eq!(consumer.state(), ConsumerState::ProductSelection);
        assert!(consumer.order().is_none());
    }

    #[test]
    fn unknown_state_is_fatal() {
        let directory = Arc::new(Directory::new());
        let mut consumer = deterministic_consumer(directory, 100.0);
        consumer.state = ConsumerState::Unknown;

        let err = consumer.step().unwrap_err();
        assert!(matches!(err, MarketError::InvariantViolation(_)));
    }
}
