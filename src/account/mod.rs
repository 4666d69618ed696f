// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account engine: per-account state, the registry that owns it, the
//! receivable listener and the transaction publisher.

pub mod publisher;
pub mod receiver;
pub mod registry;
pub mod state;

pub use publisher::TransactionPublisher;
pub use receiver::ReceivableIngestion;
pub use registry::{AccountRegistry, ActiveSet};
pub use state::{AccountIdentity, AccountState, Publish};
