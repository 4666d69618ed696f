// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Webhook delivery of account entries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client;

use super::{NotificationSink, SinkError};
use crate::ledger::AccountEntry;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// POSTs each entry as JSON to a fixed callback URL.
pub struct WebhookSink {
    http: Client,
    url: String,
    header: Option<(HeaderName, HeaderValue)>,
}

impl WebhookSink {
    pub fn new(url: &str, header: Option<(&str, &str)>) -> Result<Self, SinkError> {
        let header = header
            .map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| SinkError::Config(format!("header name {name:?}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| SinkError::Config(format!("header value: {e}")))?;
                Ok::<_, SinkError>((name, value))
            })
            .transpose()?;

        let http = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| SinkError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.to_string(),
            header,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, entry: &AccountEntry) -> Result<(), SinkError> {
        let mut request = self.http.post(&self.url).json(entry);
        if let Some((name, value)) = &self.header {
            request = request.header(name.clone(), value.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Acknowledges every entry without I/O. Used when no callback URL is set.
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn deliver(&self, _entry: &AccountEntry) -> Result<(), SinkError> {
        Ok(())
    }
}
