//! Consumer state machine states

/// Stages of the purchase cycle that a wait can lead into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ProductSelection,
    DetailsSelection,
    DealerSearch,
    DealerContact,
}

/// Current state of a consumer's purchase state machine.
///
/// The happy path is `ProductSelection -> DetailsSelection ->
/// DealerSearch -> DealerContact` and back, with a `RandWait` inserted
/// between any two stages as a randomized delay. `Unknown` is an invalid
/// sentinel: stepping while in it is a fatal logic error, never a
/// transition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    ProductSelection,
    DetailsSelection,
    DealerSearch,
    DealerContact,
    RandWait {
        /// Ticks left before the pending stage is entered.
        turns_remaining: u32,
        next: Stage,
        /// Marks a wait taken inside `DealerContact` between two
        /// attempts at the same dealer, as opposed to an ordinary
        /// stage-to-stage delay.
        inner: bool,
    },
    Unknown,
}

impl From<Stage> for ConsumerState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::ProductSelection => ConsumerState::ProductSelection,
            Stage::DetailsSelection => ConsumerState::DetailsSelection,
            Stage::DealerSearch => ConsumerState::DealerSearch,
            Stage::DealerContact => ConsumerState::DealerContact,
        }
    }
}
