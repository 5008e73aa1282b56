//! Per-endpoint cost ledger.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::schema::ResourceConfig;
use crate::resource::charge::Charge;

/// Thresholds and decay rate for the ledger.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSettings {
    pub warn_threshold: u64,
    pub drop_threshold: u64,
    pub decay_per_second: u64,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        let defaults = ResourceConfig::default();
        Self {
            warn_threshold: defaults.warn_threshold,
            drop_threshold: defaults.drop_threshold,
            decay_per_second: defaults.decay_per_second,
        }
    }
}

impl From<&ResourceConfig> for ResourceSettings {
    fn from(config: &ResourceConfig) -> Self {
        Self {
            warn_threshold: config.warn_threshold,
            drop_threshold: config.drop_threshold,
            decay_per_second: config.decay_per_second,
        }
    }
}

#[derive(Debug)]
struct EndpointState {
    balance: f64,
    last_update: Instant,
}

#[derive(Debug)]
struct Ledger {
    entries: DashMap<IpAddr, EndpointState>,
    settings: ResourceSettings,
}

impl Ledger {
    fn decayed_balance(&self, state: &mut EndpointState) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        state.balance =
            (state.balance - elapsed * self.settings.decay_per_second as f64).max(0.0);
        state.last_update = now;
        state.balance
    }
}

/// Hands out [`Consumer`] handles and owns the shared ledger.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    ledger: Arc<Ledger>,
}

impl ResourceManager {
    pub fn new(settings: ResourceSettings) -> Self {
        Self {
            ledger: Arc::new(Ledger {
                entries: DashMap::new(),
                settings,
            }),
        }
    }

    /// Handle tracking an inbound remote endpoint.
    pub fn new_inbound_endpoint(&self, addr: IpAddr) -> Consumer {
        Consumer {
            kind: ConsumerKind::Inbound {
                ledger: Arc::clone(&self.ledger),
                addr,
            },
        }
    }

    /// The distinguished handle for privileged traffic; never shed,
    /// never charged.
    pub fn new_unlimited_endpoint(&self, name: String) -> Consumer {
        Consumer {
            kind: ConsumerKind::Unlimited { name },
        }
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(ResourceSettings::default())
    }
}

#[derive(Debug)]
enum ConsumerKind {
    Inbound { ledger: Arc<Ledger>, addr: IpAddr },
    Unlimited { name: String },
}

/// Abuse-tracking handle for one request's remote endpoint.
#[derive(Debug)]
pub struct Consumer {
    kind: ConsumerKind,
}

impl Consumer {
    /// Whether this endpoint has already exhausted its budget and should
    /// be refused before any expensive work.
    pub fn should_disconnect(&self) -> bool {
        match &self.kind {
            ConsumerKind::Inbound { ledger, addr } => match ledger.entries.get_mut(addr) {
                Some(mut entry) => {
                    ledger.decayed_balance(entry.value_mut()) > ledger.settings.drop_threshold as f64
                }
                None => false,
            },
            ConsumerKind::Unlimited { .. } => false,
        }
    }

    /// Debit the given cost against this endpoint.
    pub fn charge(&self, charge: Charge) {
        match &self.kind {
            ConsumerKind::Inbound { ledger, addr } => {
                let mut entry = ledger.entries.entry(*addr).or_insert_with(|| EndpointState {
                    balance: 0.0,
                    last_update: Instant::now(),
                });
                let before = ledger.decayed_balance(entry.value_mut());
                entry.balance = before + charge.cost as f64;
                if before <= ledger.settings.warn_threshold as f64
                    && entry.balance > ledger.settings.warn_threshold as f64
                {
                    tracing::warn!(
                        remote = %addr,
                        balance = entry.balance,
                        fee = charge.label,
                        "endpoint approaching abuse threshold"
                    );
                }
            }
            ConsumerKind::Unlimited { name } => {
                tracing::trace!(endpoint = %name, fee = charge.label, "unlimited endpoint charge ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::charge::FEE_REFERENCE_RPC;

    fn strict_settings() -> ResourceSettings {
        // No decay so balances are deterministic under test.
        ResourceSettings {
            warn_threshold: 30,
            drop_threshold: 50,
            decay_per_second: 0,
        }
    }

    #[test]
    fn fresh_endpoint_is_not_disconnected() {
        let manager = ResourceManager::new(strict_settings());
        let consumer = manager.new_inbound_endpoint("10.0.0.1".parse().unwrap());
        assert!(!consumer.should_disconnect());
    }

    #[test]
    fn charges_accumulate_until_disconnect() {
        let manager = ResourceManager::new(strict_settings());
        let consumer = manager.new_inbound_endpoint("10.0.0.2".parse().unwrap());

        consumer.charge(FEE_REFERENCE_RPC);
        consumer.charge(FEE_REFERENCE_RPC);
        assert!(!consumer.should_disconnect());

        consumer.charge(FEE_REFERENCE_RPC);
        assert!(consumer.should_disconnect());
    }

    #[test]
    fn balances_are_shared_per_address() {
        let manager = ResourceManager::new(strict_settings());
        let addr: IpAddr = "10.0.0.3".parse().unwrap();

        let first = manager.new_inbound_endpoint(addr);
        first.charge(FEE_REFERENCE_RPC);
        first.charge(FEE_REFERENCE_RPC);
        first.charge(FEE_REFERENCE_RPC);

        let second = manager.new_inbound_endpoint(addr);
        assert!(second.should_disconnect());
    }

    #[test]
    fn unlimited_handle_is_never_shed() {
        let manager = ResourceManager::new(strict_settings());
        let consumer = manager.new_unlimited_endpoint("127.0.0.1".into());
        for _ in 0..100 {
            consumer.charge(FEE_REFERENCE_RPC);
        }
        assert!(!consumer.should_disconnect());
    }
}
