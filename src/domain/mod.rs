//! Onboarding entities and the ports the application layer depends on.

pub mod credential;
pub mod customer;
pub mod funding_source;
pub mod money;
pub mod ports;
pub mod processor;
pub mod resource;
pub mod transfer;
