// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet management API endpoints.
//!
//! Wallet keys are returned once, on create or import. The server keeps
//! them only wrapped under the master key, and only while unlocked.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    state::AppState,
    vault::{EncryptionKey, IssuedWallet, WalletSummary},
};

#[derive(Debug, Clone, Deserialize)]
pub struct ImportWalletRequest {
    pub mnemonic: String,
    /// 32-byte hex wallet key. Generated when omitted.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlockWalletRequest {
    pub encryption_key: String,
}

/// Credentials of a newly stored wallet. Shown once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedWalletResponse {
    pub name: String,
    pub mnemonic: String,
    pub encryption_key: String,
}

impl IssuedWalletResponse {
    fn new(name: String, issued: IssuedWallet) -> Self {
        Self {
            name,
            mnemonic: issued.mnemonic.to_string(),
            encryption_key: issued.encryption_key.to_hex(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletListResponse {
    pub wallets: Vec<WalletSummary>,
    pub total: usize,
}

fn parse_key(raw: &str) -> Result<EncryptionKey, ApiError> {
    raw.parse::<EncryptionKey>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

pub async fn list_wallets(
    State(state): State<AppState>,
) -> Result<Json<WalletListResponse>, ApiError> {
    let wallets = state.vault.list()?;
    Ok(Json(WalletListResponse {
        total: wallets.len(),
        wallets,
    }))
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WalletSummary>, ApiError> {
    Ok(Json(state.vault.get(&name)?))
}

/// Generate a mnemonic and wallet key and store the wallet unlocked.
pub async fn create_wallet(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<IssuedWalletResponse>), ApiError> {
    let issued = state.vault.create(&name)?;
    Ok((
        StatusCode::CREATED,
        Json(IssuedWalletResponse::new(name, issued)),
    ))
}

pub async fn import_wallet(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<ImportWalletRequest>,
) -> Result<(StatusCode, Json<IssuedWalletResponse>), ApiError> {
    let key = request
        .encryption_key
        .as_deref()
        .map(parse_key)
        .transpose()?;
    let issued = state.vault.import(&name, &request.mnemonic, key)?;
    Ok((
        StatusCode::CREATED,
        Json(IssuedWalletResponse::new(name, issued)),
    ))
}

pub async fn lock_wallet(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WalletSummary>, ApiError> {
    state.vault.lock(&name)?;
    Ok(Json(state.vault.get(&name)?))
}

pub async fn unlock_wallet(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UnlockWalletRequest>,
) -> Result<Json<WalletSummary>, ApiError> {
    let key = parse_key(&request.encryption_key)?;
    state.vault.unlock(&name, &key)?;
    Ok(Json(state.vault.get(&name)?))
}
