//! # Adapters Layer
//!
//! Connections to the outside world: the event bus subscription and a
//! store implementation.

pub mod bus;
pub mod store;

pub use bus::AccessControlEventHandler;
pub use store::InMemoryStore;
