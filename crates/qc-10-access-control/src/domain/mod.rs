//! # Domain Layer
//!
//! Membership, trust and policy logic with no I/O dependencies.
//! This is the inner layer of the hexagonal architecture.

pub mod cache;
pub mod crl;
pub mod crypto;
pub mod defaults;
pub mod entities;
pub mod errors;
pub mod evaluator;
pub mod member;
pub mod multi_sign;
pub mod policy;
pub mod policy_table;
pub mod trust_store;
pub mod version;
