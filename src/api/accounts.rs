// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account API endpoints: derivation, enable/disable, transactions and the
//! entries search.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, WalletError},
    ledger::{AccountEntry, Address, Amount, LedgerSnapshot},
    state::AppState,
    storage::AccountRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub wallet_name: String,
    pub account_index: u32,
    pub state: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub disabled_at: Option<DateTime<Utc>>,
}

impl From<AccountRecord> for AccountResponse {
    fn from(record: AccountRecord) -> Self {
        Self {
            state: if record.is_enabled() {
                AccountStatus::Enabled
            } else {
                AccountStatus::Disabled
            },
            address: record.address,
            wallet_name: record.wallet_name,
            account_index: record.account_index,
            disabled_at: record.disabled_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountListResponse {
    pub accounts: Vec<AccountResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub receiver_address: String,
    pub amount: Amount,
    /// Height the caller last saw. Defaults to the cached height.
    #[serde(default)]
    pub last_height: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRequest {
    pub representative_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntriesSearch {
    pub search: Vec<EntriesQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntriesQuery {
    pub address: String,
    /// First height to return. Defaults to 1.
    #[serde(default)]
    pub from_height: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntriesResponse {
    pub entries: Vec<AccountEntry>,
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse::<Address>().map_err(ApiError::from)
}

pub async fn create_account(
    State(state): State<AppState>,
    Path(wallet_name): Path<String>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let record = state.registry.create(&wallet_name).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Path(wallet_name): Path<String>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let accounts: Vec<AccountResponse> = state
        .registry
        .records_by_wallet(&wallet_name)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(AccountListResponse {
        total: accounts.len(),
        accounts,
    }))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address = parse_address(&address)?;
    Ok(Json(state.registry.record(&address)?.into()))
}

/// Cached ledger snapshot of the account. 404 while unopened.
pub async fn get_account_details(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<LedgerSnapshot>, ApiError> {
    let address = parse_address(&address)?;
    Ok(Json(state.registry.snapshot(&address)?))
}

pub async fn disable_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address = parse_address(&address)?;
    Ok(Json(state.registry.disable(&address).await?.into()))
}

pub async fn enable_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let address = parse_address(&address)?;
    Ok(Json(state.registry.enable(&address).await?.into()))
}

pub async fn send(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<SendRequest>,
) -> Result<Json<AccountEntry>, ApiError> {
    let address = parse_address(&address)?;
    let receiver = parse_address(&request.receiver_address)?;
    let expected_height = match request.last_height {
        Some(height) => height,
        None => state.registry.state(&address)?.height(),
    };

    let entry = state
        .registry
        .send(&address, receiver, request.amount, Some(expected_height))
        .await?;
    Ok(Json(entry))
}

pub async fn change(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<ChangeRequest>,
) -> Result<Json<AccountEntry>, ApiError> {
    let address = parse_address(&address)?;
    let representative = parse_address(&request.representative_address)?;
    Ok(Json(state.registry.change(&address, representative).await?))
}

/// Account entries from the ledger.
///
/// Each range is clamped to the cached height of its account; empty ranges
/// are skipped. Without a body, every enabled account is searched from
/// height 1.
pub async fn search_entries(
    State(state): State<AppState>,
    body: Option<Json<EntriesSearch>>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let ranges: Vec<(Address, u64, u64)> = match body {
        Some(Json(search)) => search
            .search
            .iter()
            .map(|query| -> Result<(Address, u64, u64), ApiError> {
                let address = parse_address(&query.address)?;
                let height = state.registry.state(&address)?.height();
                Ok((address, query.from_height.unwrap_or(1).max(1), height))
            })
            .collect::<Result<_, _>>()?,
        None => state
            .registry
            .enabled_heights()
            .into_iter()
            .map(|(address, height)| (address, 1, height))
            .collect(),
    };

    let mut entries = Vec::new();
    for (address, from_height, to_height) in ranges {
        if from_height > to_height {
            continue;
        }
        let found: Vec<AccountEntry> = state
            .node
            .account_entries(&address, from_height, to_height)
            .await
            .map_err(WalletError::from)?
            .try_collect()
            .await
            .map_err(WalletError::from)?;
        entries.extend(found);
    }
    Ok(Json(EntriesResponse { entries }))
}
