use super::locks::CustomerLocks;
use crate::domain::customer::{Customer, CustomerStatus, Profile};
use crate::domain::funding_source::{BankDetails, FundingSource, VerificationStatus};
use crate::domain::money::Amount;
use crate::domain::ports::{CustomerStoreBox, GatewayBox};
use crate::domain::processor::{
    CustomerBody, FundingSourceBody, GatewayRequest, MicroDepositsBody, Operation, ResourceResult,
    TransferBody,
};
use crate::domain::resource::ResourceId;
use crate::domain::transfer::Transfer;
use crate::error::{OnboardingError, Result};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Drives customers through the onboarding state machine:
///
/// ```text
/// Created -> BankLinked -> DepositsPending -> Verified -> TransferInitiated
///     \___________\______________\_______________\______-> Failed
/// ```
///
/// Each step holds the customer's lock across its remote call and writes the
/// record only once the processor has accepted the call, so a failed step
/// leaves the customer where it was and can simply be invoked again.
pub struct Orchestrator {
    store: CustomerStoreBox,
    gateway: GatewayBox,
    destination: ResourceId,
    locks: CustomerLocks,
}

impl Orchestrator {
    /// Creates a new `Orchestrator`.
    ///
    /// # Arguments
    ///
    /// * `store` - Where onboarding records are kept.
    /// * `gateway` - Access to the remote processor.
    /// * `destination` - The operator's account that receives every payment.
    pub fn new(store: CustomerStoreBox, gateway: GatewayBox, destination: ResourceId) -> Self {
        Self {
            store,
            gateway,
            destination,
            locks: CustomerLocks::new(),
        }
    }

    pub fn destination(&self) -> &ResourceId {
        &self.destination
    }

    /// Registers the customer with the processor and records it as `Created`.
    ///
    /// Nothing is stored unless the processor accepted the customer. If the
    /// processor hands back the address of a customer already on record, that
    /// record is returned untouched.
    #[instrument(skip_all)]
    pub async fn create_customer(&self, profile: Profile) -> Result<Customer> {
        profile.validate()?;
        let request =
            GatewayRequest::new(Operation::CreateCustomer).payload(&CustomerBody::from(&profile))?;
        let resource = self.gateway.call(request).await?.created()?;

        let _guard = self.locks.acquire(resource.id()).await;
        if let Some(existing) = self.store.get(resource.id()).await? {
            // The processor answered with a customer we already track; keep its record.
            warn!(customer_id = %existing.id, "processor returned an existing customer");
            return Ok(existing);
        }
        let customer = Customer::new(resource, profile);
        self.store.upsert(customer.clone()).await?;
        info!(customer_id = %customer.id, "customer created");
        Ok(customer)
    }

    /// Links a bank account to a `Created` customer. The first link wins.
    #[instrument(skip(self, bank))]
    pub async fn attach_funding_source(
        &self,
        customer_id: &str,
        bank: BankDetails,
    ) -> Result<FundingSource> {
        bank.validate()?;
        let _guard = self.locks.acquire(customer_id).await;
        let mut customer = self.load(customer_id).await?;
        ensure_active(&customer)?;
        customer.require(CustomerStatus::Created, "attach a funding source")?;

        let name = bank.display_name(&customer.profile.full_name());
        let request = GatewayRequest::new(Operation::AttachFundingSource)
            .target(&customer.resource)
            .payload(&FundingSourceBody::new(&bank, &name))?;
        let resource = self.dispatch(&mut customer, request).await?.created()?;

        let funding_source = FundingSource::new(resource, &customer.id, &bank, name);
        customer.funding_source = Some(funding_source.clone());
        customer.advance(CustomerStatus::BankLinked);
        self.store.upsert(customer).await?;
        info!(funding_source_id = %funding_source.id, "bank account linked");
        Ok(funding_source)
    }

    /// Asks the processor to send the two trial deposits.
    #[instrument(skip(self))]
    pub async fn initiate_trial_deposits(&self, funding_source_id: &str) -> Result<FundingSource> {
        let (_guard, mut customer) = self.lock_owner(funding_source_id).await?;
        ensure_active(&customer)?;
        if customer.status == CustomerStatus::DepositsPending {
            return Err(OnboardingError::AlreadyInProgress(format!(
                "trial deposits already sent to funding source {funding_source_id}"
            )));
        }
        customer.require(CustomerStatus::BankLinked, "initiate trial deposits")?;

        let target = linked(&customer, funding_source_id)?.resource.clone();
        let request = GatewayRequest::new(Operation::InitiateMicroDeposits).target(&target);
        match self.dispatch(&mut customer, request).await {
            Ok(_) => {
                let funding_source = self.record_deposits_sent(customer).await?;
                info!("trial deposits initiated");
                Ok(funding_source)
            }
            Err(OnboardingError::RequestRejected {
                status: 409,
                detail,
                ..
            }) => {
                // The processor already has deposits in flight; catch the record up.
                warn!(%detail, "trial deposits were already initiated at the processor");
                self.record_deposits_sent(customer).await?;
                Err(OnboardingError::AlreadyInProgress(detail))
            }
            Err(e) => Err(e),
        }
    }

    /// Confirms the two trial deposit amounts.
    ///
    /// Repeating a successful verification returns the verified funding source
    /// without another remote call. A mismatch is surfaced as the processor's
    /// rejection and leaves the customer at `DepositsPending`.
    #[instrument(skip(self, amount1, amount2))]
    pub async fn verify_trial_deposits(
        &self,
        funding_source_id: &str,
        amount1: Amount,
        amount2: Amount,
    ) -> Result<FundingSource> {
        let (_guard, mut customer) = self.lock_owner(funding_source_id).await?;
        ensure_active(&customer)?;
        let current = linked(&customer, funding_source_id)?;
        if current.is_verified() {
            debug!("funding source already verified");
            return Ok(current.clone());
        }
        customer.require(CustomerStatus::DepositsPending, "verify trial deposits")?;

        let request = GatewayRequest::new(Operation::VerifyMicroDeposits)
            .target(&current.resource)
            .payload(&MicroDepositsBody::new(amount1, amount2))?;
        self.dispatch(&mut customer, request).await?;

        let funding_source = set_funding_status(&mut customer, VerificationStatus::Verified)?;
        customer.advance(CustomerStatus::Verified);
        self.store.upsert(customer).await?;
        info!("funding source verified");
        Ok(funding_source)
    }

    /// Sends `amount` from the customer's verified funding source to the
    /// destination account.
    ///
    /// The transfer is attempted once. `idempotency_key` (generated when absent)
    /// lets a caller retry after a transient failure without creating a second
    /// transfer; a key whose transfer already settled is answered locally.
    #[instrument(skip(self, amount, idempotency_key))]
    pub async fn make_payment(
        &self,
        customer_id: &str,
        amount: Amount,
        idempotency_key: Option<String>,
    ) -> Result<Transfer> {
        let key = match idempotency_key {
            Some(key) if key.trim().is_empty() => {
                return Err(OnboardingError::Validation(
                    "idempotency key must not be blank".to_string(),
                ));
            }
            Some(key) => key.trim().to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let _guard = self.locks.acquire(customer_id).await;
        let mut customer = self.load(customer_id).await?;
        if let Some(settled) = customer
            .transfer_by_key(&key)
            .filter(|transfer| transfer.is_settled())
        {
            info!(idempotency_key = %key, "replaying settled transfer");
            return settled.outcome();
        }
        ensure_active(&customer)?;

        let source = match &customer.funding_source {
            Some(fs) if fs.is_verified() => fs.resource.clone(),
            _ => {
                return Err(OnboardingError::PreconditionFailed(format!(
                    "customer {customer_id} has no verified funding source"
                )));
            }
        };

        let transfer = Transfer::requested(key.clone(), source.clone(), self.destination.clone(), amount);
        let request = GatewayRequest::new(Operation::CreateTransfer)
            .payload(&TransferBody::new(&source, &self.destination, amount))?
            .idempotency_key(&key);

        match self.dispatch(&mut customer, request).await {
            Ok(result) => {
                let transfer = transfer.accept(result.created()?);
                customer.transfers.push(transfer.clone());
                customer.advance(CustomerStatus::TransferInitiated);
                self.store.upsert(customer).await?;
                info!(transfer_id = ?transfer.id, %amount, "transfer accepted");
                Ok(transfer)
            }
            Err(OnboardingError::RequestRejected {
                status,
                code,
                detail,
            }) => {
                warn!(%code, %detail, "transfer rejected by processor");
                customer.transfers.push(transfer.reject(status, &code, &detail));
                self.store.upsert(customer).await?;
                Err(OnboardingError::RequestRejected {
                    status,
                    code,
                    detail,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn customer(&self, customer_id: &str) -> Result<Customer> {
        self.load(customer_id).await
    }

    pub async fn customers(&self) -> Result<Vec<Customer>> {
        self.store.list().await
    }

    pub async fn funding_source(&self, funding_source_id: &str) -> Result<FundingSource> {
        let owner = self
            .store
            .find_by_funding_source(funding_source_id)
            .await?
            .ok_or_else(|| unknown_funding_source(funding_source_id))?;
        linked(&owner, funding_source_id).cloned()
    }

    async fn load(&self, customer_id: &str) -> Result<Customer> {
        self.store
            .get(customer_id)
            .await?
            .ok_or_else(|| OnboardingError::NotFound(format!("customer {customer_id}")))
    }

    /// Locks the customer owning `funding_source_id` and reads its record
    /// under the lock.
    async fn lock_owner(&self, funding_source_id: &str) -> Result<(OwnedMutexGuard<()>, Customer)> {
        let owner = self
            .store
            .find_by_funding_source(funding_source_id)
            .await?
            .ok_or_else(|| unknown_funding_source(funding_source_id))?;
        let guard = self.locks.acquire(&owner.id).await;
        let customer = self.load(&owner.id).await?;
        Ok((guard, customer))
    }

    /// Calls the processor on behalf of `customer`. A 403 means the processor
    /// will no longer act on this customer's resources, so the record is
    /// moved to `Failed`.
    async fn dispatch(&self, customer: &mut Customer, request: GatewayRequest) -> Result<ResourceResult> {
        let operation = request.operation;
        match self.gateway.call(request).await {
            Err(e @ OnboardingError::RequestRejected { status: 403, .. }) => {
                warn!(
                    customer_id = %customer.id,
                    operation = operation.as_str(),
                    error = %e,
                    "processor refused customer resource, marking customer failed"
                );
                customer.advance(CustomerStatus::Failed);
                self.store.upsert(customer.clone()).await?;
                Err(e)
            }
            outcome => outcome,
        }
    }

    async fn record_deposits_sent(&self, mut customer: Customer) -> Result<FundingSource> {
        let funding_source = set_funding_status(&mut customer, VerificationStatus::DepositsSent)?;
        customer.advance(CustomerStatus::DepositsPending);
        self.store.upsert(customer).await?;
        Ok(funding_source)
    }
}

fn ensure_active(customer: &Customer) -> Result<()> {
    if customer.status == CustomerStatus::Failed {
        return Err(OnboardingError::PreconditionFailed(format!(
            "customer {} has failed onboarding",
            customer.id
        )));
    }
    Ok(())
}

fn unknown_funding_source(funding_source_id: &str) -> OnboardingError {
    OnboardingError::NotFound(format!("funding source {funding_source_id}"))
}

fn linked<'a>(customer: &'a Customer, funding_source_id: &str) -> Result<&'a FundingSource> {
    customer
        .funding_source
        .as_ref()
        .filter(|fs| fs.id == funding_source_id)
        .ok_or_else(|| unknown_funding_source(funding_source_id))
}

fn set_funding_status(customer: &mut Customer, status: VerificationStatus) -> Result<FundingSource> {
    let funding_source = customer
        .funding_source
        .as_mut()
        .ok_or_else(|| OnboardingError::NotFound(format!("funding source of {}", customer.id)))?;
    funding_source.status = status;
    Ok(funding_source.clone())
}
