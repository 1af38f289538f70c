//! # Shared Types Crate
//!
//! This crate contains the chain entities and configuration shared by the
//! access-control subsystem, the event bus and the surrounding node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Wire Shaped**: Types mirror the node's wire messages; they carry no
//!   verification logic of their own.

pub mod chain_config;
pub mod entities;
pub mod errors;

pub use chain_config::*;
pub use entities::*;
pub use errors::*;
