//! # Access Control Subsystem (QC-10)
//!
//! Decides who may do what on a permissioned chain: resolves signer
//! identities, validates them against the chain's trust roots and evaluates
//! endorsement policies for transactions, inter-node messages and
//! multi-sign proposals.
//!
//! ## Architecture
//!
//! This subsystem follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Policies, evaluator, trust store, no I/O
//! - **Ports Layer** (`ports/`): Provider API, event handler and store traits
//! - **Service Layer** (`service/`): Generic provider over three membership modes
//! - **Adapters Layer** (`adapters/`): Event bus subscriber, in-memory store
//!
//! ## Auth Types
//!
//! | Auth type | Credential | Admins |
//! |---|---|---|
//! | `PermissionedWithCert` | X.509 certificate, hash or alias | OU `admin` certificates |
//! | `PermissionedWithKey` | public key | per-org trust-root keys |
//! | `Public` | public key | pinned keys, counted individually |
//!
//! ## Policy Strata
//!
//! Every block-version-aware call picks the policy set in force for the
//! block: `<= 220`, `< 2330` or current.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

// Re-export public API
pub use adapters::{AccessControlEventHandler, InMemoryStore};
pub use config::AccessControlConfig;
pub use domain::entities::{MemberStatus, Principal, RelatedMaterialKind, Role};
pub use domain::errors::{AccessControlError, AccessControlResult};
pub use domain::member::ResolvedMember;
pub use domain::policy::{Policy, Rule};
pub use domain::version::{PolicyStratum, BLOCK_VERSION_220, BLOCK_VERSION_2320, BLOCK_VERSION_2330};
pub use ports::inbound::{AccessControlProvider, ChainEventHandler};
pub use ports::outbound::{BlockchainStore, PubkeyInfo};
pub use service::factory::{new_provider, new_provider_with_config, AccessControlHandle};
pub use service::provider::AccessControl;
