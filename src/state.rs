// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::account::AccountRegistry;
use crate::node::LedgerNode;
use crate::vault::KeyVault;

#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<KeyVault>,
    pub registry: Arc<AccountRegistry>,
    pub node: Arc<dyn LedgerNode>,
}

impl AppState {
    pub fn new(
        vault: Arc<KeyVault>,
        registry: Arc<AccountRegistry>,
        node: Arc<dyn LedgerNode>,
    ) -> Self {
        Self {
            vault,
            registry,
            node,
        }
    }
}
