#![allow(dead_code)]

use ach_onboarding::application::orchestrator::Orchestrator;
use ach_onboarding::domain::customer::Profile;
use ach_onboarding::domain::funding_source::BankDetails;
use ach_onboarding::domain::money::Amount;
use ach_onboarding::domain::ports::Gateway;
use ach_onboarding::domain::processor::{GatewayRequest, Operation, ResourceResult};
use ach_onboarding::domain::resource::ResourceId;
use ach_onboarding::error::{OnboardingError, Result};
use ach_onboarding::infrastructure::in_memory::InMemoryCustomerStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROCESSOR: &str = "https://api-sandbox.dwolla.com";

#[derive(Default)]
struct ProcessorState {
    calls: Vec<GatewayRequest>,
    customers: u32,
    funding_sources: u32,
    transfers: u32,
    deposits_sent: HashSet<String>,
    verified: HashSet<String>,
    deposit_amounts: Option<(String, String)>,
    transfers_by_key: HashMap<String, String>,
    commit_then_time_out: bool,
    reject_transfers: Option<(String, String)>,
}

/// In-process stand-in for the remote ACH processor.
///
/// Hands out `c1`, `fs1`, `t1`... addresses, enforces the processor-side
/// rules the orchestrator relies on (one deposit initiation per funding
/// source, amount matching, idempotent transfers) and records every call.
#[derive(Clone, Default)]
pub struct FakeProcessor {
    state: Arc<Mutex<ProcessorState>>,
    latency: Option<Duration>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Amounts the processor "sent" as trial deposits (defaults to 0.03 / 0.09).
    pub fn set_deposit_amounts(&self, amount1: &str, amount2: &str) {
        self.state.lock().unwrap().deposit_amounts = Some((amount1.to_string(), amount2.to_string()));
    }

    /// The next new transfer is committed but the response is lost.
    pub fn commit_next_transfer_then_time_out(&self) {
        self.state.lock().unwrap().commit_then_time_out = true;
    }

    pub fn reject_transfers(&self, code: &str, detail: &str) {
        self.state.lock().unwrap().reject_transfers = Some((code.to_string(), detail.to_string()));
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn last_call(&self, operation: Operation) -> Option<GatewayRequest> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .rev()
            .find(|r| r.operation == operation)
            .cloned()
    }

    /// Distinct transfers the processor has actually created.
    pub fn transfers_created(&self) -> u32 {
        self.state.lock().unwrap().transfers
    }

    fn handle(&self, request: GatewayRequest) -> Result<ResourceResult> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(request.clone());
        let target = request.target.as_ref().map(|t| t.id().to_string());

        match request.operation {
            Operation::CreateCustomer => {
                state.customers += 1;
                Ok(created(&format!("customers/c{}", state.customers)))
            }
            Operation::AttachFundingSource => {
                state.funding_sources += 1;
                Ok(created(&format!("funding-sources/fs{}", state.funding_sources)))
            }
            Operation::InitiateMicroDeposits => {
                let fs = target.unwrap_or_default();
                if !state.deposits_sent.insert(fs) {
                    return Err(OnboardingError::rejected(
                        409,
                        "Conflict",
                        "Micro-deposits already initiated for this funding source.",
                    ));
                }
                Ok(created("micro-deposits/md1"))
            }
            Operation::VerifyMicroDeposits => {
                let fs = target.unwrap_or_default();
                let payload = request.payload.unwrap_or_default();
                let (expected1, expected2) = state
                    .deposit_amounts
                    .clone()
                    .unwrap_or_else(|| ("0.03".to_string(), "0.09".to_string()));
                let given1 = payload["amount1"]["value"].as_str().unwrap_or_default();
                let given2 = payload["amount2"]["value"].as_str().unwrap_or_default();
                if given1 != expected1 || given2 != expected2 {
                    return Err(OnboardingError::rejected(
                        400,
                        "InvalidAmount",
                        "Wrong micro-deposit amount(s).",
                    ));
                }
                state.verified.insert(fs);
                Ok(ResourceResult {
                    status: 200,
                    location: None,
                    body: None,
                })
            }
            Operation::CreateTransfer => {
                if let Some((code, detail)) = &state.reject_transfers {
                    return Err(OnboardingError::rejected(400, code.clone(), detail.clone()));
                }
                let key = request.idempotency_key.clone().unwrap_or_default();
                if let Some(existing) = state.transfers_by_key.get(&key) {
                    return Ok(created(existing));
                }
                state.transfers += 1;
                let path = format!("transfers/t{}", state.transfers);
                state.transfers_by_key.insert(key, path.clone());
                if state.commit_then_time_out {
                    state.commit_then_time_out = false;
                    return Err(OnboardingError::TransientFailure(
                        "processor call timed out".to_string(),
                    ));
                }
                Ok(created(&path))
            }
        }
    }
}

fn created(path: &str) -> ResourceResult {
    ResourceResult {
        status: 201,
        location: Some(ResourceId::parse(&format!("{PROCESSOR}/{path}")).unwrap()),
        body: None,
    }
}

#[async_trait]
impl Gateway for FakeProcessor {
    async fn call(&self, request: GatewayRequest) -> Result<ResourceResult> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.handle(request)
    }
}

pub fn destination() -> ResourceId {
    ResourceId::parse(&format!("{PROCESSOR}/funding-sources/master")).unwrap()
}

pub fn orchestrator(processor: &FakeProcessor) -> (Orchestrator, InMemoryCustomerStore) {
    let store = InMemoryCustomerStore::new();
    let orchestrator = Orchestrator::new(
        Box::new(store.clone()),
        Box::new(processor.clone()),
        destination(),
    );
    (orchestrator, store)
}

pub fn profile(first: &str, last: &str, email: &str) -> Profile {
    Profile {
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: email.to_string(),
        ..Default::default()
    }
}

pub fn bank() -> BankDetails {
    BankDetails {
        routing_number: "222222226".to_string(),
        account_number: "123456789".to_string(),
        ..Default::default()
    }
}

pub fn amount(raw: &str) -> Amount {
    Amount::parse(raw).unwrap()
}

/// Runs a customer through to `Verified` and returns (customer id, funding source id).
pub async fn verified_customer(orchestrator: &Orchestrator, email: &str) -> (String, String) {
    let customer = orchestrator
        .create_customer(profile("Ana", "Lee", email))
        .await
        .unwrap();
    let fs = orchestrator
        .attach_funding_source(&customer.id, bank())
        .await
        .unwrap();
    orchestrator.initiate_trial_deposits(&fs.id).await.unwrap();
    orchestrator
        .verify_trial_deposits(&fs.id, amount("0.03"), amount("0.09"))
        .await
        .unwrap();
    (customer.id, fs.id)
}
