//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that verifiers, RPC and the event bus call
//! - **Outbound (Driven)**: Storage this subsystem reads from

pub mod inbound;
pub mod outbound;
