//! Test network shared by the scenarios.

use qc_10_access_control::test_helpers::{cert_chain_config, TestCa, TestIdentity};
use qc_10_access_control::{new_provider, AccessControlHandle, InMemoryStore, Role};
use shared_bus::{BlockchainEvent, EventPublisher, InMemoryEventBus};
use shared_types::ChainConfig;
use std::sync::Arc;

/// Organizations `org1..orgN`, each with its own root CA.
pub struct Orgs {
    pub cas: Vec<TestCa>,
}

impl Orgs {
    pub fn new(count: usize) -> Self {
        Self {
            cas: (1..=count).map(|i| TestCa::root(&format!("org{i}"))).collect(),
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        let refs: Vec<&TestCa> = self.cas.iter().collect();
        cert_chain_config(&refs)
    }

    /// Admin of the `i`-th org (zero based).
    pub fn admin(&self, i: usize) -> TestIdentity {
        let ca = &self.cas[i];
        ca.issue(Role::Admin, &format!("admin.{}", ca.org_id))
    }

    pub fn client(&self, i: usize) -> TestIdentity {
        let ca = &self.cas[i];
        ca.issue(Role::Client, &format!("client.{}", ca.org_id))
    }
}

/// A node's access-control provider wired to a bus.
pub struct Node {
    pub bus: InMemoryEventBus,
    pub store: Arc<InMemoryStore>,
    pub handle: AccessControlHandle,
}

impl Node {
    pub fn start(chain_config: &ChainConfig) -> Self {
        Self::start_with_store(chain_config, Arc::new(InMemoryStore::new()))
    }

    pub fn start_with_store(chain_config: &ChainConfig, store: Arc<InMemoryStore>) -> Self {
        init_tracing();
        let bus = InMemoryEventBus::new();
        let handle = new_provider(chain_config, "org1", store.clone(), &bus).unwrap();
        Self { bus, store, handle }
    }

    /// Publish `event` and apply everything queued so far.
    pub async fn commit(&mut self, event: BlockchainEvent) {
        assert_eq!(self.bus.publish(event).await, 1);
        assert_eq!(self.handle.events.drain_pending(), 1);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
