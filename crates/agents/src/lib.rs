//! Agent decision engine for the Agora market simulation
//!
//! Two kinds of autonomous agents interact through a shared [`Directory`]:
//!
//! - **Producers** own a private magazine of stock items. Each tick they
//!   advance batch production and recompute unit prices through a
//!   pluggable [`PricingStrategy`], and they expose snapshot queries plus
//!   a transactional `sell` operation.
//! - **Consumers** run a turn-based purchase state machine: pick a
//!   product, work out an acceptable price and quantity, scan the
//!   directory for matching offers, score the candidate sellers and
//!   attempt a purchase, backing off and retrying on failure.
//!
//! Every agent ticks on its own tokio interval; there is no global turn
//! barrier. Consumers therefore always act on possibly-stale snapshots,
//! which is why a purchase re-validates the chosen offer and treats
//! rejection as a normal outcome.

pub mod consumer;
pub mod directory;
pub mod pricing;
pub mod producer;

pub use consumer::{
    Consumer, ConsumerConfig, ConsumerHandle, ConsumerState, Order, Purchase, Stage,
};
pub use directory::Directory;
pub use pricing::{ElasticAroundBase, ElasticAroundCurrent, PricingKind, PricingStrategy};
pub use producer::{ItemSpec, Producer, ProducerConfig, ProducerHandle};
