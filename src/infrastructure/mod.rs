//! Adapters behind the domain ports: record storage, processor access and configuration.

pub mod config;
pub mod credentials;
pub mod gateway;
pub mod in_memory;
