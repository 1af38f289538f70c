//! # Provider Factory
//!
//! Picks the membership mode from the chain's auth type and wires the
//! provider to the event bus.

use crate::adapters::bus::AccessControlEventHandler;
use crate::config::AccessControlConfig;
use crate::domain::errors::AccessControlResult;
use crate::ports::inbound::{AccessControlProvider, ChainEventHandler};
use crate::ports::outbound::BlockchainStore;
use crate::service::cert_provider::CertMode;
use crate::service::mode::MembershipMode;
use crate::service::pk_provider::PublicMode;
use crate::service::provider::AccessControl;
use crate::service::pwk_provider::PermissionedKeyMode;
use shared_bus::EventSubscriber;
use shared_types::{AuthType, ChainConfig};
use std::sync::Arc;

/// A provider and the subscriber that keeps it current.
pub struct AccessControlHandle {
    pub provider: Arc<dyn AccessControlProvider>,
    /// Must be driven (`run` or `drain_pending`) for chain events to apply.
    pub events: AccessControlEventHandler,
}

/// Build the provider for `chain_config` with default node settings.
pub fn new_provider(
    chain_config: &ChainConfig,
    local_org_id: &str,
    store: Arc<dyn BlockchainStore>,
    bus: &dyn EventSubscriber,
) -> AccessControlResult<AccessControlHandle> {
    new_provider_with_config(AccessControlConfig::for_org(local_org_id), chain_config, store, bus)
}

/// Build the provider for `chain_config`.
pub fn new_provider_with_config(
    config: AccessControlConfig,
    chain_config: &ChainConfig,
    store: Arc<dyn BlockchainStore>,
    bus: &dyn EventSubscriber,
) -> AccessControlResult<AccessControlHandle> {
    match chain_config.auth_type {
        AuthType::PermissionedWithCert => {
            let provider = AccessControl::new(config, chain_config, store, CertMode::new()?)?;
            Ok(wire(provider, bus))
        }
        AuthType::PermissionedWithKey => {
            let provider = AccessControl::new(config, chain_config, store, PermissionedKeyMode::new())?;
            Ok(wire(provider, bus))
        }
        AuthType::Public => {
            let provider = AccessControl::new(config, chain_config, store, PublicMode::new())?;
            Ok(wire(provider, bus))
        }
    }
}

fn wire<M: MembershipMode + 'static>(provider: AccessControl<M>, bus: &dyn EventSubscriber) -> AccessControlHandle {
    let provider = Arc::new(provider);
    let handler: Arc<dyn ChainEventHandler> = provider.clone();
    AccessControlHandle {
        provider,
        events: AccessControlEventHandler::subscribe(bus, handler),
    }
}
