//! # Access Control Test Suite
//!
//! Cross-crate scenarios: a provider built by the factory, kept current by
//! chain events published on the shared bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # Test network: bus, store, orgs, provider
//!     ├── cert_policies.rs   # Certificate-mode endorsement policies
//!     ├── key_modes.rs       # Permissioned-key and public chains
//!     ├── multi_sign.rs      # Multi-sign vote progression
//!     └── chain_events.rs    # Freeze, revoke, config, cert and payer events
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::multi_sign
//! ```

pub mod integration;
