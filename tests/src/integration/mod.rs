//! # Integration Scenarios
//!
//! Every scenario builds a provider with `new_provider`, publishes chain
//! events on an `InMemoryEventBus` and pumps them into the provider with
//! `drain_pending` before verifying.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod cert_policies;
#[cfg(test)]
mod chain_events;
#[cfg(test)]
mod key_modes;
#[cfg(test)]
mod multi_sign;
