// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! wNCG → NCG: observes confirmed `Burn` logs, resolves the Chain-N
//! recipient out of the 32-byte tag and dispatches the native transfer.
//! There is no refund path here: the wrapped token is already burned, so
//! anything unprocessable pages the operator instead.

use crate::audit::AuditDocument;
use crate::error::BridgeResult;
use crate::metrics::BridgeMetrics;
use crate::monitor::EventObserver;
use crate::ncg_transfer::NcgTransfer;
use crate::node::Integrations;
use crate::pagerduty::Severity;
use crate::store::HistoryStore;
use crate::types::{
    BridgeEvent, BurnEvent, EventEnvelope, ExchangeLeg, ExchangeStatus, HistoryRecord, NcgAmount,
    SourceNetwork,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct WncgBurnObserver {
    history: HistoryStore,
    transfer: Arc<dyn NcgTransfer>,
    planet_id: [u8; 6],
    integrations: Integrations,
    metrics: Arc<BridgeMetrics>,
}

impl WncgBurnObserver {
    pub fn new(
        history: HistoryStore,
        transfer: Arc<dyn NcgTransfer>,
        planet_id: [u8; 6],
        integrations: Integrations,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            history,
            transfer,
            planet_id,
            integrations,
            metrics,
        }
    }

    async fn process(&self, event: &BurnEvent) -> BridgeResult<()> {
        let tx_id = event.tx_id();
        if self
            .history
            .has(SourceNetwork::Ethereum, &tx_id, event.log_index)
            .await?
        {
            debug!("[WncgBurn] {}#{} already processed, skipping", tx_id, event.log_index);
            return Ok(());
        }

        let recipient = match event.parse_recipient(&self.planet_id) {
            Ok(recipient) => recipient,
            Err(e) => {
                // the wrapped token is gone; nothing can be sent back
                error!("[WncgBurn] {} has an unusable recipient tag: {}", tx_id, e);
                self.record_rejected(event, NcgAmount::ZERO, "invalid recipient tag")
                    .await?;
                self.metrics
                    .rejections
                    .with_label_values(&["invalid_recipient_tag"])
                    .inc();
                self.integrations
                    .pager
                    .trigger(
                        &format!("burn {} carries an unusable recipient tag", tx_id),
                        Severity::Critical,
                        serde_json::json!({
                            "source_tx_id": tx_id,
                            "log_index": event.log_index,
                            "to": hex::encode(event.to),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                return Ok(());
            }
        };

        let amount = match NcgAmount::from_wei_floor(event.amount) {
            Ok(amount) => amount,
            Err(e) => {
                error!("[WncgBurn] {} amount out of range: {}", tx_id, e);
                self.record_rejected(event, NcgAmount::ZERO, "amount out of range")
                    .await?;
                self.metrics
                    .rejections
                    .with_label_values(&["amount_out_of_range"])
                    .inc();
                self.integrations
                    .pager
                    .trigger(
                        &format!("burn {} amount does not fit the native asset", tx_id),
                        Severity::Critical,
                        serde_json::json!({
                            "source_tx_id": tx_id,
                            "amount": event.amount.to_string(),
                        }),
                    )
                    .await;
                return Ok(());
            }
        };

        if amount.is_zero() {
            warn!(
                "[WncgBurn] {} burns {} base units, below one centi-NCG",
                tx_id, event.amount
            );
            self.record_rejected(event, amount, "dust amount").await?;
            self.metrics.rejections.with_label_values(&["dust_amount"]).inc();
            self.integrations
                .pager
                .trigger(
                    &format!("burn {} is dust and cannot be exchanged", tx_id),
                    Severity::Error,
                    serde_json::json!({
                        "source_tx_id": tx_id,
                        "sender": format!("{:?}", event.sender),
                        "amount": event.amount.to_string(),
                    }),
                )
                .await;
            let _ = self
                .integrations
                .telegram
                .notify_rejected(
                    SourceNetwork::Ethereum,
                    &tx_id,
                    &format!("{:?}", event.sender),
                    amount,
                    "dust amount",
                )
                .await;
            return Ok(());
        }

        self.history
            .insert(&HistoryRecord {
                source_network: SourceNetwork::Ethereum,
                source_tx_id: tx_id.clone(),
                log_index: event.log_index,
                leg: ExchangeLeg::Exchange,
                sink: recipient.to_string(),
                requested: amount,
                sent: amount,
                counter_tx_id: None,
                status: ExchangeStatus::Emitted,
                reason: None,
            })
            .await?;

        match self.transfer.transfer(recipient, amount, None).await {
            Ok(transfer_tx) => {
                info!(
                    "[WncgBurn] transferred {} NCG to {} for {} ({})",
                    amount, recipient, tx_id, transfer_tx
                );
                self.history
                    .set_counter_tx(
                        SourceNetwork::Ethereum,
                        &tx_id,
                        event.log_index,
                        ExchangeLeg::Exchange,
                        &transfer_tx,
                    )
                    .await?;
                self.metrics
                    .emissions
                    .with_label_values(&["transfer", "ok"])
                    .inc();
                let _ = self
                    .integrations
                    .telegram
                    .notify_transferred(&tx_id, &transfer_tx, &recipient.to_string(), amount)
                    .await;
                self.audit(
                    event,
                    Some(transfer_tx),
                    recipient.to_string(),
                    amount,
                    ExchangeStatus::Emitted,
                    None,
                )
                .await;
            }
            Err(e) => {
                error!("[WncgBurn] transfer for {} failed: {}", tx_id, e);
                self.metrics
                    .emissions
                    .with_label_values(&["transfer", "err"])
                    .inc();
                self.integrations
                    .pager
                    .trigger(
                        &format!("NCG transfer failed for burn {}", tx_id),
                        Severity::Critical,
                        serde_json::json!({
                            "source_tx_id": tx_id,
                            "recipient": recipient.to_string(),
                            "amount": amount.to_string(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                self.audit(
                    event,
                    None,
                    recipient.to_string(),
                    amount,
                    ExchangeStatus::Emitted,
                    Some(format!("transfer failed: {}", e)),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn record_rejected(
        &self,
        event: &BurnEvent,
        amount: NcgAmount,
        reason: &str,
    ) -> BridgeResult<()> {
        self.history
            .insert(&HistoryRecord {
                source_network: SourceNetwork::Ethereum,
                source_tx_id: event.tx_id(),
                log_index: event.log_index,
                leg: ExchangeLeg::Exchange,
                sink: hex::encode(event.to),
                requested: amount,
                sent: NcgAmount::ZERO,
                counter_tx_id: None,
                status: ExchangeStatus::Rejected,
                reason: Some(reason.to_string()),
            })
            .await?;
        self.audit(
            event,
            None,
            hex::encode(event.to),
            NcgAmount::ZERO,
            ExchangeStatus::Rejected,
            Some(reason.to_string()),
        )
        .await;
        Ok(())
    }

    async fn audit(
        &self,
        event: &BurnEvent,
        destination_tx_id: Option<String>,
        recipient: String,
        amount: NcgAmount,
        status: ExchangeStatus,
        reason: Option<String>,
    ) {
        self.integrations
            .audit
            .record(AuditDocument {
                source_network: SourceNetwork::Ethereum.as_str(),
                source_tx_id: event.tx_id(),
                destination_tx_id,
                sender: format!("{:?}", event.sender),
                recipient,
                requested: amount.to_string(),
                sent: amount.to_string(),
                fee: NcgAmount::ZERO.to_string(),
                status: status.as_str(),
                reason,
                timestamp_ms: crate::store::now_ms(),
            })
            .await;
    }
}

#[async_trait]
impl EventObserver<BurnEvent> for WncgBurnObserver {
    async fn observe(&self, envelope: &EventEnvelope<BurnEvent>) -> BridgeResult<()> {
        for event in &envelope.events {
            self.process(event).await?;
        }
        Ok(())
    }
}
