//! Request handlers for the onboarding API

use super::error::ApiResult;
use super::state::AppState;
use crate::domain::customer::{Customer, Profile};
use crate::domain::funding_source::{BankDetails, FundingSource};
use crate::domain::money::Amount;
use crate::domain::transfer::TransferStatus;
use crate::infrastructure::gateway::IDEMPOTENCY_KEY;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerResponse {
    pub customer_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachFundingSourceResponse {
    pub funding_source_id: String,
}

#[derive(Debug, Serialize)]
pub struct StepStatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub amount1: String,
    #[serde(default)]
    pub amount2: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub transfer_id: Option<String>,
    pub status: TransferStatus,
    pub idempotency_key: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version.clone(),
    })
}

/// Create a customer at the processor
pub async fn create_customer(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> ApiResult<Json<CreateCustomerResponse>> {
    let customer = state
        .run_step(move |orchestrator| async move { orchestrator.create_customer(profile).await })
        .await?;
    Ok(Json(CreateCustomerResponse {
        customer_id: customer.id,
    }))
}

pub async fn list_customers(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.orchestrator.customers().await?))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.orchestrator.customer(&id).await?))
}

/// Link a bank account to a customer
pub async fn attach_funding_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(bank): Json<BankDetails>,
) -> ApiResult<Json<AttachFundingSourceResponse>> {
    let funding_source = state
        .run_step(move |orchestrator| async move {
            orchestrator.attach_funding_source(&id, bank).await
        })
        .await?;
    Ok(Json(AttachFundingSourceResponse {
        funding_source_id: funding_source.id,
    }))
}

pub async fn get_funding_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FundingSource>> {
    Ok(Json(state.orchestrator.funding_source(&id).await?))
}

pub async fn initiate_trial_deposits(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StepStatusResponse>> {
    state
        .run_step(move |orchestrator| async move { orchestrator.initiate_trial_deposits(&id).await })
        .await?;
    Ok(Json(StepStatusResponse { status: "pending" }))
}

/// Verify trial deposit amounts; a mismatch answers 409
pub async fn verify_trial_deposits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VerifyRequest>,
) -> ApiResult<Json<StepStatusResponse>> {
    let amount1 = Amount::parse(&body.amount1)?;
    let amount2 = Amount::parse(&body.amount2)?;
    state
        .run_step(move |orchestrator| async move {
            orchestrator
                .verify_trial_deposits(&id, amount1, amount2)
                .await
        })
        .await
        .map_err(|e| super::error::ApiError::from(e).rejection_status(StatusCode::CONFLICT))?;
    Ok(Json(StepStatusResponse { status: "verified" }))
}

/// Pay the destination account from the customer's verified bank account
pub async fn make_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<Json<PaymentResponse>> {
    let amount = Amount::parse(&body.amount)?;
    let header_key = headers
        .get(IDEMPOTENCY_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let key = body.idempotency_key.or(header_key);

    let transfer = state
        .run_step(move |orchestrator| async move {
            orchestrator.make_payment(&id, amount, key).await
        })
        .await?;
    Ok(Json(PaymentResponse {
        transfer_id: transfer.id,
        status: transfer.status,
        idempotency_key: transfer.idempotency_key,
    }))
}
