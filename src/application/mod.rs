//! Application layer containing the onboarding workflow.
//!
//! This module defines the `Orchestrator` which drives each customer through
//! bank linking, trial-deposit verification and payment. Steps for the same
//! customer are serialized with per-customer async locks; steps for different
//! customers run independently.

pub mod locks;
pub mod orchestrator;
