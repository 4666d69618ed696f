// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! reqwest-backed ledger node and work service clients.
//!
//! Unary calls exchange JSON bodies. Streams are newline-delimited JSON,
//! one record per line; blank lines are keep-alives.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use super::{LedgerNode, NodeError, NodeStream, Worker};
use crate::ledger::{AccountEntry, Address, Block, LedgerSnapshot, Receivable, Transaction, Work};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest NDJSON record accepted from a stream.
const MAX_LINE_BYTES: usize = 1 << 20;

fn build_client() -> Result<Client, NodeError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| NodeError::Request(format!("failed to build HTTP client: {e}")))
}

async fn post<B: Serialize + ?Sized>(
    http: &Client,
    url: String,
    body: &B,
    timeout: Option<Duration>,
) -> Result<Response, NodeError> {
    let mut request = http.post(&url).json(body);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .map_err(|e| NodeError::Request(format!("POST {url}: {e}")))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(NodeError::Rejected { status, body });
    }
    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, NodeError> {
    response
        .json()
        .await
        .map_err(|e| NodeError::Decode(e.to_string()))
}

fn ndjson<T: DeserializeOwned + Send + 'static>(response: Response) -> NodeStream<T> {
    let bytes = response.bytes_stream().map_err(std::io::Error::other);
    FramedRead::new(StreamReader::new(bytes), LinesCodec::new_with_max_length(MAX_LINE_BYTES))
        .filter_map(|line| async move {
            match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => {
                    Some(serde_json::from_str(&line).map_err(|e| NodeError::Decode(e.to_string())))
                }
                Err(e) => Some(Err(NodeError::Stream(e.to_string()))),
            }
        })
        .boxed()
}

// =============================================================================
// Ledger node
// =============================================================================

#[derive(Serialize)]
struct AddressesRequest<'a> {
    addresses: &'a [Address],
}

#[derive(Deserialize)]
struct SnapshotsResponse {
    snapshots: Vec<LedgerSnapshot>,
}

#[derive(Serialize)]
struct EntriesRequest<'a> {
    address: &'a Address,
    from_height: u64,
    to_height: u64,
}

#[derive(Clone)]
pub struct HttpLedgerNode {
    http: Client,
    base_url: String,
}

impl HttpLedgerNode {
    pub fn new(base_url: &str) -> Result<Self, NodeError> {
        Ok(Self {
            http: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl LedgerNode for HttpLedgerNode {
    async fn account_snapshots(
        &self,
        addresses: &[Address],
    ) -> Result<Vec<LedgerSnapshot>, NodeError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let response = post(
            &self.http,
            self.url("/accounts/lookup"),
            &AddressesRequest { addresses },
            Some(REQUEST_TIMEOUT),
        )
        .await?;
        Ok(read_json::<SnapshotsResponse>(response).await?.snapshots)
    }

    async fn publish(&self, transaction: &Transaction) -> Result<(), NodeError> {
        post(
            &self.http,
            self.url("/transactions"),
            transaction,
            Some(REQUEST_TIMEOUT),
        )
        .await?;
        Ok(())
    }

    async fn receivable_stream(
        &self,
        addresses: &[Address],
    ) -> Result<NodeStream<Receivable>, NodeError> {
        let response = post(
            &self.http,
            self.url("/receivables/stream"),
            &AddressesRequest { addresses },
            None,
        )
        .await?;
        Ok(ndjson(response))
    }

    async fn account_entries(
        &self,
        address: &Address,
        from_height: u64,
        to_height: u64,
    ) -> Result<NodeStream<AccountEntry>, NodeError> {
        let response = post(
            &self.http,
            self.url("/accounts/entries/stream"),
            &EntriesRequest {
                address,
                from_height,
                to_height,
            },
            None,
        )
        .await?;
        Ok(ndjson(response))
    }
}

// =============================================================================
// Work service
// =============================================================================

#[derive(Serialize)]
struct WorkRequest<'a> {
    block: &'a Block,
}

#[derive(Deserialize)]
struct WorkResponse {
    work: Work,
}

#[derive(Clone)]
pub struct HttpWorker {
    http: Client,
    url: String,
}

impl HttpWorker {
    pub fn new(base_url: &str) -> Result<Self, NodeError> {
        Ok(Self {
            http: build_client()?,
            url: format!("{}/works", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Worker for HttpWorker {
    async fn work(&self, block: &Block) -> Result<Work, NodeError> {
        // Work generation can be slow; no request timeout beyond connect
        let response = post(&self.http, self.url.clone(), &WorkRequest { block }, None).await?;
        Ok(read_json::<WorkResponse>(response).await?.work)
    }
}
