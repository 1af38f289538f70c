//! # Shared Bus - Chain Event Bus
//!
//! Carries committed on-chain changes (chain configuration, certificate
//! management, public-key management, consensus epochs, blocks) to the
//! access-control subsystem.
//!
//! ```text
//! ┌──────────────┐                    ┌────────────────┐
//! │  Committer   │                    │ Access Control │
//! │              │    publish()       │                │
//! │              │ ──────┐            │                │
//! └──────────────┘       │            └────────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Events of one topic are delivered in publish order.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BlockchainEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
