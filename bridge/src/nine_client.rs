// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Async GraphQL client for a Nine Chronicles node.
//!
//! Keeps the transport deliberately small: plain HTTP POSTs of
//! `{query}` documents, a shared pooled client, and linear retry on
//! transient transport failures. Query construction and response plucking
//! live here so the rest of the crate only sees typed values.

use crate::error::{BridgeError, BridgeResult};
use crate::types::{NcgAddress, NcgAmount, NcgTransferredEvent};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

/// Read and submit operations the bridge needs from a Nine Chronicles node.
/// The production implementation is [`NineChroniclesClient`]; tests provide
/// programmable fakes.
#[async_trait]
pub trait NineNode: Send + Sync {
    /// Endpoint identity, used in staging fan-out logs.
    fn endpoint(&self) -> &str;

    async fn tip_index(&self) -> BridgeResult<u64>;
    async fn block_hash(&self, index: u64) -> BridgeResult<String>;
    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64>;
    /// Inbound transfers of the native asset to `recipient` in the block.
    async fn transfer_events(
        &self,
        block_hash: &str,
        recipient: &NcgAddress,
    ) -> BridgeResult<Vec<NcgTransferredEvent>>;
    /// Builds an unsigned transaction wrapping the base64 plain value for
    /// the account behind the base64 public key; returns raw tx bytes.
    async fn create_unsigned_transaction(
        &self,
        plain_value_base64: &str,
        public_key_base64: &str,
    ) -> BridgeResult<Vec<u8>>;
    /// Combines an unsigned transaction with a detached signature.
    async fn attach_signature(
        &self,
        unsigned_tx: &[u8],
        signature: &[u8],
    ) -> BridgeResult<Vec<u8>>;
    /// Pushes a signed transaction (base64) into the node's mempool.
    async fn stage_transaction(&self, signed_tx_base64: &str) -> BridgeResult<bool>;
}

#[derive(Clone, Debug)]
pub struct NineChroniclesClient {
    http_client: reqwest::Client,
    graphql_url: String,
}

impl NineChroniclesClient {
    pub fn new(graphql_url: impl Into<String>) -> Self {
        fn shared_http_client() -> reqwest::Client {
            static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
            CLIENT
                .get_or_init(|| {
                    reqwest::Client::builder()
                        .pool_max_idle_per_host(16)
                        .tcp_keepalive(Some(Duration::from_secs(30)))
                        .connect_timeout(Duration::from_secs(2))
                        .timeout(Duration::from_secs(30))
                        .build()
                        .expect("Failed to build reqwest client")
                })
                .clone()
        }

        Self {
            http_client: shared_http_client(),
            graphql_url: graphql_url.into(),
        }
    }

    /// Posts a GraphQL document and returns the `data` payload.
    async fn query(&self, document: &str) -> BridgeResult<Value> {
        fn is_transient_transport_error(err: &reqwest::Error) -> bool {
            if err.is_connect() || err.is_timeout() {
                return true;
            }
            let msg = err.to_string().to_lowercase();
            msg.contains("connection closed")
                || msg.contains("connection reset")
                || msg.contains("broken pipe")
                || msg.contains("unexpected eof")
                || msg.contains("incomplete")
        }

        let body = json!({ "query": document });
        let max_attempts: usize = 3;
        let mut last_transport_err: Option<BridgeError> = None;

        for attempt in 0..max_attempts {
            let response = match self
                .http_client
                .post(&self.graphql_url)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt + 1 < max_attempts && is_transient_transport_error(&err) {
                        last_transport_err =
                            Some(BridgeError::TransientProviderError(err.to_string()));
                        tracing::warn!(
                            "[NineClient] transport error against {} (attempt {}/{}), retrying",
                            self.graphql_url,
                            attempt + 1,
                            max_attempts
                        );
                        tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                        continue;
                    }
                    return Err(err.into());
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                tracing::error!("[NineClient] <<< HTTP error {}\n{}", status, error_text);
                return Err(BridgeError::ProviderError(format!(
                    "HTTP error: {} - {}",
                    status, error_text
                )));
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| BridgeError::ProviderError(e.to_string()))?;

            if let Some(errors) = payload.get("errors").filter(|e| !e.is_null()) {
                tracing::error!(
                    "[NineClient] GraphQL error - Query:\n{}\nErrors:\n{}",
                    document,
                    errors
                );
                return Err(BridgeError::GraphQlError(errors.to_string()));
            }

            return payload
                .get("data")
                .cloned()
                .ok_or_else(|| BridgeError::ProviderError("response without data".into()));
        }

        Err(last_transport_err
            .unwrap_or_else(|| BridgeError::TransientProviderError("query failed".into())))
    }
}

/// Walks a dotted path through a JSON value.
fn pluck<'a>(mut value: &'a Value, path: &[&str]) -> BridgeResult<&'a Value> {
    for segment in path {
        value = value.get(segment).ok_or_else(|| {
            BridgeError::ProviderError(format!("missing field {:?} in node response", segment))
        })?;
    }
    Ok(value)
}

fn pluck_u64(value: &Value, path: &[&str]) -> BridgeResult<u64> {
    let v = pluck(value, path)?;
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| {
            BridgeError::ProviderError(format!("field {:?} is not an integer: {}", path, v))
        })
}

fn pluck_str<'a>(value: &'a Value, path: &[&str]) -> BridgeResult<&'a str> {
    pluck(value, path)?.as_str().ok_or_else(|| {
        BridgeError::ProviderError(format!("field {:?} is not a string", path))
    })
}

fn decode_hex_field(value: &Value, path: &[&str]) -> BridgeResult<Vec<u8>> {
    let raw = pluck_str(value, path)?;
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| BridgeError::ProviderError(format!("field {:?} is not hex: {}", path, e)))
}

#[async_trait]
impl NineNode for NineChroniclesClient {
    fn endpoint(&self) -> &str {
        &self.graphql_url
    }

    async fn tip_index(&self) -> BridgeResult<u64> {
        let data = self.query("query { nodeStatus { tip { index } } }").await?;
        pluck_u64(&data, &["nodeStatus", "tip", "index"])
    }

    async fn block_hash(&self, index: u64) -> BridgeResult<String> {
        let document = format!(
            "query {{ chainQuery {{ blockQuery {{ block(index: {}) {{ hash }} }} }} }}",
            index
        );
        let data = self.query(&document).await?;
        Ok(pluck_str(&data, &["chainQuery", "blockQuery", "block", "hash"])?.to_string())
    }

    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64> {
        let document = format!(
            "query {{ chainQuery {{ blockQuery {{ block(hash: \"{}\") {{ index }} }} }} }}",
            block_hash
        );
        let data = self.query(&document).await?;
        // a null block means the hash is unknown to the canonical chain
        if pluck(&data, &["chainQuery", "blockQuery", "block"])?.is_null() {
            return Err(BridgeError::ProviderError(format!(
                "block {} not found on the canonical chain",
                block_hash
            )));
        }
        pluck_u64(&data, &["chainQuery", "blockQuery", "block", "index"])
    }

    async fn transfer_events(
        &self,
        block_hash: &str,
        recipient: &NcgAddress,
    ) -> BridgeResult<Vec<NcgTransferredEvent>> {
        let document = format!(
            "query {{ transferNCGHistories(blockHash: \"{}\", recipient: \"{}\") \
             {{ blockHash txId sender recipient amount memo }} }}",
            block_hash.strip_prefix("0x").unwrap_or(block_hash),
            recipient
        );
        let data = self.query(&document).await?;
        let histories = pluck(&data, &["transferNCGHistories"])?
            .as_array()
            .ok_or_else(|| {
                BridgeError::ProviderError("transferNCGHistories is not a list".into())
            })?;

        let mut events = Vec::with_capacity(histories.len());
        for history in histories {
            let amount: NcgAmount = pluck_str(history, &["amount"])?.parse()?;
            events.push(NcgTransferredEvent {
                tx_id: pluck_str(history, &["txId"])?.to_string(),
                block_hash: pluck_str(history, &["blockHash"])?.to_string(),
                sender: pluck_str(history, &["sender"])?.parse()?,
                amount,
                memo: pluck(history, &["memo"])?.as_str().map(|s| s.to_string()),
            });
        }
        Ok(events)
    }

    async fn create_unsigned_transaction(
        &self,
        plain_value_base64: &str,
        public_key_base64: &str,
    ) -> BridgeResult<Vec<u8>> {
        let document = format!(
            "query {{ transaction {{ unsignedTransaction(publicKey: \"{}\", plainValue: \"{}\") }} }}",
            public_key_base64, plain_value_base64
        );
        let data = self.query(&document).await?;
        decode_hex_field(&data, &["transaction", "unsignedTransaction"])
    }

    async fn attach_signature(
        &self,
        unsigned_tx: &[u8],
        signature: &[u8],
    ) -> BridgeResult<Vec<u8>> {
        let document = format!(
            "query {{ transaction {{ signTransaction(unsignedTransaction: \"{}\", signature: \"{}\") }} }}",
            hex::encode(unsigned_tx),
            hex::encode(signature)
        );
        let data = self.query(&document).await?;
        decode_hex_field(&data, &["transaction", "signTransaction"])
    }

    async fn stage_transaction(&self, signed_tx_base64: &str) -> BridgeResult<bool> {
        let document = format!(
            "mutation {{ stageTransaction(payload: \"{}\") }}",
            signed_tx_base64
        );
        let data = self.query(&document).await?;
        let staged = pluck(&data, &["stageTransaction"])?;
        staged
            .as_bool()
            // some node versions answer with the tx id instead of a boolean
            .or_else(|| staged.as_str().map(|s| !s.is_empty()))
            .ok_or_else(|| {
                BridgeError::ProviderError(format!("unexpected stage response: {}", staged))
            })
    }
}

/// Block source over the custodial address's inbound transfers, reporting a
/// tip lowered by the confirmation depth.
pub struct NineDepositSource {
    node: std::sync::Arc<dyn NineNode>,
    recipient: NcgAddress,
    confirmations: u64,
}

impl NineDepositSource {
    pub fn new(
        node: std::sync::Arc<dyn NineNode>,
        recipient: NcgAddress,
        confirmations: u64,
    ) -> Self {
        Self {
            node,
            recipient,
            confirmations,
        }
    }
}

#[async_trait]
impl crate::monitor::BlockSource for NineDepositSource {
    type Event = NcgTransferredEvent;

    fn name(&self) -> &'static str {
        "ncg-deposit"
    }

    async fn tip_index(&self) -> BridgeResult<u64> {
        let tip = self.node.tip_index().await?;
        Ok(tip.saturating_sub(self.confirmations))
    }

    async fn block_hash(&self, index: u64) -> BridgeResult<String> {
        self.node.block_hash(index).await
    }

    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64> {
        self.node.block_index(block_hash).await
    }

    async fn events_in(&self, index: u64) -> BridgeResult<Vec<NcgTransferredEvent>> {
        let block_hash = self.node.block_hash(index).await?;
        self.node.transfer_events(&block_hash, &self.recipient).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluck_walks_nested_objects() {
        let value = json!({"a": {"b": {"c": 42}}});
        assert_eq!(pluck_u64(&value, &["a", "b", "c"]).unwrap(), 42);
        assert!(pluck(&value, &["a", "x"]).is_err());
    }

    #[test]
    fn test_pluck_u64_accepts_string_integers() {
        // some node versions serialize long indices as strings
        let value = json!({"tip": {"index": "123456"}});
        assert_eq!(pluck_u64(&value, &["tip", "index"]).unwrap(), 123_456);
        let value = json!({"tip": {"index": 7}});
        assert_eq!(pluck_u64(&value, &["tip", "index"]).unwrap(), 7);
        let value = json!({"tip": {"index": "seven"}});
        assert!(pluck_u64(&value, &["tip", "index"]).is_err());
    }

    #[test]
    fn test_decode_hex_field() {
        let value = json!({"transaction": {"unsignedTransaction": "0xdeadbeef"}});
        assert_eq!(
            decode_hex_field(&value, &["transaction", "unsignedTransaction"]).unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        let value = json!({"transaction": {"unsignedTransaction": "cafe"}});
        assert_eq!(
            decode_hex_field(&value, &["transaction", "unsignedTransaction"]).unwrap(),
            vec![0xca, 0xfe]
        );
        let value = json!({"transaction": {"unsignedTransaction": "zzz"}});
        assert!(decode_hex_field(&value, &["transaction", "unsignedTransaction"]).is_err());
    }

    #[tokio::test]
    async fn test_query_against_unreachable_node() {
        crate::test_utils::init_tracing();
        let client = NineChroniclesClient::new("http://127.0.0.1:1/graphql");
        let result = client.tip_index().await;
        assert!(result.is_err());
    }
}
