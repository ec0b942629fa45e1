// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Append-oriented audit sink. Every emission (and every terminal
//! rejection) writes one JSON document to a configured search index so
//! operators can reconcile both chains later. The sink is best-effort:
//! failures are logged, the exchange pipeline does not depend on it.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
pub struct AuditConfig {
    pub endpoint: Option<String>,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuditConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.as_deref().map(|e| !e.is_empty()).unwrap_or(false)
            && !self.index.is_empty()
    }
}

/// One document per emission attempt.
#[derive(Clone, Debug, Serialize)]
pub struct AuditDocument {
    pub source_network: &'static str,
    pub source_tx_id: String,
    pub destination_tx_id: Option<String>,
    pub sender: String,
    pub recipient: String,
    pub requested: String,
    pub sent: String,
    pub fee: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp_ms: i64,
}

pub struct AuditSink {
    config: AuditConfig,
    client: Client,
}

impl AuditSink {
    pub fn new(config: AuditConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build reqwest client");
        Self { config, client }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Appends one document. Failures are logged and swallowed.
    pub async fn record(&self, document: AuditDocument) {
        if !self.is_configured() {
            debug!(
                "audit sink not configured, dropping document for {}",
                document.source_tx_id
            );
            return;
        }
        let endpoint = self.config.endpoint.as_deref().unwrap_or_default();
        let url = format!(
            "{}/{}/_doc",
            endpoint.trim_end_matches('/'),
            self.config.index
        );

        let mut request = self.client.post(&url).json(&document);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(
                    "audited {} -> {:?} ({})",
                    document.source_tx_id, document.destination_tx_id, document.status
                );
            }
            Ok(resp) => warn!(
                "audit store returned {} for {}",
                resp.status(),
                document.source_tx_id
            ),
            Err(e) => warn!("audit write failed for {}: {:?}", document.source_tx_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configured() {
        assert!(!AuditConfig::default().is_configured());
        assert!(!AuditConfig {
            endpoint: Some("https://search.internal:9200".into()),
            index: String::new(),
            ..Default::default()
        }
        .is_configured());
        assert!(AuditConfig {
            endpoint: Some("https://search.internal:9200".into()),
            index: "bridge-exchanges".into(),
            ..Default::default()
        }
        .is_configured());
    }

    #[test]
    fn test_document_serialization_skips_empty_reason() {
        let doc = AuditDocument {
            source_network: "nineChronicles",
            source_tx_id: "tx".into(),
            destination_tx_id: Some("0xmint".into()),
            sender: "0xaaaa".into(),
            recipient: "0xbbbb".into(),
            requested: "150.00".into(),
            sent: "99.00".into(),
            fee: "1.00".into(),
            status: "emitted",
            reason: None,
            timestamp_ms: 0,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("reason").is_none());
        assert_eq!(json["requested"], "150.00");
    }

    #[tokio::test]
    async fn test_unconfigured_record_is_a_noop() {
        crate::test_utils::init_tracing();
        let sink = AuditSink::new(AuditConfig::default());
        sink.record(AuditDocument {
            source_network: "ethereum",
            source_tx_id: "0xburn".into(),
            destination_tx_id: None,
            sender: "0x1".into(),
            recipient: "0x2".into(),
            requested: "10.00".into(),
            sent: "10.00".into(),
            fee: "0.00".into(),
            status: "emitted",
            reason: None,
            timestamp_ms: 0,
        })
        .await;
    }
}
