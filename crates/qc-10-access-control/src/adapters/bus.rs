//! # Event Bus Adapter
//!
//! Bridges `shared-bus` events to a [`ChainEventHandler`]. Events are
//! applied one at a time in arrival order.

use crate::ports::inbound::ChainEventHandler;
use shared_bus::{EventFilter, EventSubscriber, EventTopic, Subscription, SubscriptionError};
use std::sync::Arc;
use tracing::{debug, info};

/// Subscriber feeding committed chain events to the provider.
pub struct AccessControlEventHandler {
    subscription: Subscription,
    handler: Arc<dyn ChainEventHandler>,
}

impl AccessControlEventHandler {
    /// Topics the provider reacts to.
    pub fn topics() -> Vec<EventTopic> {
        vec![
            EventTopic::ChainConfig,
            EventTopic::CertManageCertsFreeze,
            EventTopic::CertManageCertsUnfreeze,
            EventTopic::CertManageCertsRevoke,
            EventTopic::CertManageCertsDelete,
            EventTopic::CertManageCertsAliasDelete,
            EventTopic::CertManageAliasUpdate,
            EventTopic::PubkeyManageDelete,
            EventTopic::MaxbftEpochConf,
            EventTopic::BlockInfo,
        ]
    }

    /// Subscribe `handler` to the access-control topics.
    pub fn subscribe(bus: &dyn EventSubscriber, handler: Arc<dyn ChainEventHandler>) -> Self {
        Self {
            subscription: bus.subscribe(EventFilter::topics(Self::topics())),
            handler,
        }
    }

    /// Run the handler loop until the bus closes.
    pub async fn run(mut self) {
        info!("Access control event handler started");
        while let Some(event) = self.subscription.recv().await {
            debug!(topic = ?event.topic(), "Applying chain event");
            self.handler.handle_event(&event);
        }
        info!("Access control event handler stopped");
    }

    /// Apply every event already queued, without waiting. Returns how many
    /// were applied.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.subscription.try_recv() {
                Ok(Some(event)) => {
                    self.handler.handle_event(&event);
                    applied += 1;
                }
                Ok(None) => break,
                Err(SubscriptionError::Closed) => {
                    debug!("Event bus closed while draining");
                    break;
                }
            }
        }
        applied
    }
}
