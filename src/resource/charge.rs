//! Costs debited against an endpoint's abuse balance.

/// A named fixed cost for one class of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charge {
    pub cost: u64,
    pub label: &'static str,
}

impl Charge {
    pub const fn new(cost: u64, label: &'static str) -> Self {
        Self { cost, label }
    }
}

/// Reference cost of an ordinary RPC command.
pub const FEE_REFERENCE_RPC: Charge = Charge::new(20, "reference RPC");
