// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Remote custodial signer. The bridge never holds the Chain-N private key;
//! unsigned transaction bytes are shipped to a signing service that owns the
//! named key and answers with a detached signature. The derived signer
//! address must match the configured bridge address, checked once at
//! startup.

use crate::error::{BridgeError, BridgeResult};
use crate::types::NcgAddress;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Compressed secp256k1 public key of the custodial key.
    async fn public_key(&self) -> BridgeResult<Vec<u8>>;
    /// Chain-N account address derived from the custodial key.
    async fn address(&self) -> BridgeResult<NcgAddress>;
    /// Signs raw unsigned-transaction bytes, returning the signature.
    async fn sign(&self, unsigned_tx: &[u8]) -> BridgeResult<Vec<u8>>;
}

/// HTTP client for the remote signing service.
pub struct RemoteSigner {
    http_client: reqwest::Client,
    endpoint: String,
    key_id: String,
}

impl RemoteSigner {
    pub fn new(endpoint: impl Into<String>, key_id: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build reqwest client");
        Self {
            http_client,
            endpoint: endpoint.into(),
            key_id: key_id.into(),
        }
    }

    async fn key_info(&self) -> BridgeResult<serde_json::Value> {
        let url = format!("{}/keys/{}", self.endpoint.trim_end_matches('/'), self.key_id);
        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BridgeError::SigningError(format!(
                "key lookup failed with {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| BridgeError::SigningError(e.to_string()))
    }
}

#[async_trait]
impl TxSigner for RemoteSigner {
    async fn public_key(&self) -> BridgeResult<Vec<u8>> {
        let info = self.key_info().await?;
        let encoded = info
            .get("publicKey")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::SigningError("key info without publicKey".into()))?;
        BASE64
            .decode(encoded)
            .map_err(|e| BridgeError::SigningError(format!("publicKey is not base64: {}", e)))
    }

    async fn address(&self) -> BridgeResult<NcgAddress> {
        let info = self.key_info().await?;
        info.get("address")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::SigningError("key info without address".into()))?
            .parse()
            .map_err(|e| BridgeError::SigningError(format!("bad signer address: {}", e)))
    }

    async fn sign(&self, unsigned_tx: &[u8]) -> BridgeResult<Vec<u8>> {
        let url = format!(
            "{}/keys/{}/sign",
            self.endpoint.trim_end_matches('/'),
            self.key_id
        );
        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "payload": BASE64.encode(unsigned_tx) }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::SigningError(format!(
                "signing failed with {}: {}",
                status, body
            )));
        }
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BridgeError::SigningError(e.to_string()))?;
        let encoded = payload
            .get("signature")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::SigningError("response without signature".into()))?;
        BASE64
            .decode(encoded)
            .map_err(|e| BridgeError::SigningError(format!("signature is not base64: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_signer_errors() {
        let signer = RemoteSigner::new("http://127.0.0.1:1", "bridge-key");
        assert!(signer.public_key().await.is_err());
        assert!(signer.sign(b"tx").await.is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash_is_tolerated() {
        let signer = RemoteSigner::new("http://signer.internal/", "k1");
        assert_eq!(signer.endpoint.trim_end_matches('/'), "http://signer.internal");
    }
}
