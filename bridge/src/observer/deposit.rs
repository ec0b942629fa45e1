// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! NCG → wNCG: observes confirmed deposits to the custodial address,
//! validates them against policy, mints the wrapped token and issues
//! refunds where the deposit cannot (fully) be exchanged.

use crate::audit::AuditDocument;
use crate::error::BridgeResult;
use crate::eth_client::WncgMinter;
use crate::metrics::BridgeMetrics;
use crate::monitor::EventObserver;
use crate::ncg_transfer::NcgTransfer;
use crate::node::Integrations;
use crate::pagerduty::Severity;
use crate::policy::{AmountCheck, ExchangePolicy};
use crate::store::HistoryStore;
use crate::types::{
    parse_eth_recipient, EventEnvelope, ExchangeLeg, ExchangeStatus, HistoryRecord, NcgAmount,
    NcgTransferredEvent, SourceNetwork,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct NcgDepositObserver {
    history: HistoryStore,
    minter: Arc<dyn WncgMinter>,
    transfer: Arc<dyn NcgTransfer>,
    policy: ExchangePolicy,
    integrations: Integrations,
    metrics: Arc<BridgeMetrics>,
}

impl NcgDepositObserver {
    pub fn new(
        history: HistoryStore,
        minter: Arc<dyn WncgMinter>,
        transfer: Arc<dyn NcgTransfer>,
        policy: ExchangePolicy,
        integrations: Integrations,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            history,
            minter,
            transfer,
            policy,
            integrations,
            metrics,
        }
    }

    async fn process(&self, event: &NcgTransferredEvent) -> BridgeResult<()> {
        if self
            .history
            .has(SourceNetwork::NineChronicles, &event.tx_id, 0)
            .await?
        {
            debug!("[NcgDeposit] {} already processed, skipping", event.tx_id);
            return Ok(());
        }

        if self.policy.is_banned(&event.sender) {
            warn!(
                "[NcgDeposit] rejecting {} from banned sender {}",
                event.tx_id, event.sender
            );
            self.reject(event, "banned sender", "banned_sender").await?;
            return Ok(());
        }

        let recipient = match event.memo.as_deref().map(parse_eth_recipient) {
            Some(Ok(recipient)) => recipient,
            _ => {
                warn!(
                    "[NcgDeposit] {} carries no usable recipient memo ({:?})",
                    event.tx_id, event.memo
                );
                self.reject(event, "invalid recipient", "invalid_recipient")
                    .await?;
                self.refund(event, event.amount, "invalid recipient").await?;
                return Ok(());
            }
        };

        let (effective, excess) = match self.policy.evaluate(event.amount) {
            AmountCheck::TooSmall => {
                self.reject(event, "amount below minimum", "below_minimum")
                    .await?;
                self.refund(event, event.amount, "amount below minimum")
                    .await?;
                return Ok(());
            }
            AmountCheck::Within => (event.amount, NcgAmount::ZERO),
            AmountCheck::OverMax { excess } => (self.policy.maximum(), excess),
        };

        let fee = self.policy.fee_for(effective);
        let sent = effective.saturating_sub(fee);

        // the record precedes the mint so a crash in between is visible
        self.history
            .insert(&HistoryRecord {
                source_network: SourceNetwork::NineChronicles,
                source_tx_id: event.tx_id.clone(),
                log_index: 0,
                leg: ExchangeLeg::Exchange,
                sink: format!("{:?}", recipient),
                requested: event.amount,
                sent,
                counter_tx_id: None,
                status: ExchangeStatus::Emitted,
                reason: None,
            })
            .await?;

        match self.minter.mint(recipient, sent.to_wei()).await {
            Ok(receipt) => {
                let mint_tx = format!("{:?}", receipt.tx_hash);
                info!(
                    "[NcgDeposit] minted {} wNCG to {:?} for {} ({})",
                    sent, recipient, event.tx_id, mint_tx
                );
                self.history
                    .set_counter_tx(
                        SourceNetwork::NineChronicles,
                        &event.tx_id,
                        0,
                        ExchangeLeg::Exchange,
                        &mint_tx,
                    )
                    .await?;
                self.metrics.emissions.with_label_values(&["mint", "ok"]).inc();
                let _ = self
                    .integrations
                    .telegram
                    .notify_minted(
                        &event.tx_id,
                        &mint_tx,
                        &event.sender.to_string(),
                        &format!("{:?}", recipient),
                        event.amount,
                        sent,
                        fee,
                    )
                    .await;
                self.audit(event, Some(mint_tx), sent, fee, ExchangeStatus::Emitted, None)
                    .await;
            }
            Err(e) => {
                // funds are custodied but the wrapped mint did not land; a
                // human has to decide, no automatic retry
                error!("[NcgDeposit] mint for {} failed: {}", event.tx_id, e);
                self.metrics.emissions.with_label_values(&["mint", "err"]).inc();
                self.integrations
                    .pager
                    .trigger(
                        &format!("wNCG mint failed for deposit {}", event.tx_id),
                        Severity::Critical,
                        serde_json::json!({
                            "source_tx_id": event.tx_id,
                            "sender": event.sender.to_string(),
                            "amount": event.amount.to_string(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                self.audit(
                    event,
                    None,
                    sent,
                    fee,
                    ExchangeStatus::Emitted,
                    Some(format!("mint failed: {}", e)),
                )
                .await;
            }
        }

        if !excess.is_zero() {
            self.refund(event, excess, "amount above maximum").await?;
        }
        Ok(())
    }

    /// Records a terminal rejection and tells the humans.
    async fn reject(
        &self,
        event: &NcgTransferredEvent,
        reason: &str,
        reason_label: &str,
    ) -> BridgeResult<()> {
        self.history
            .insert(&HistoryRecord {
                source_network: SourceNetwork::NineChronicles,
                source_tx_id: event.tx_id.clone(),
                log_index: 0,
                leg: ExchangeLeg::Exchange,
                sink: event.memo.clone().unwrap_or_default(),
                requested: event.amount,
                sent: NcgAmount::ZERO,
                counter_tx_id: None,
                status: ExchangeStatus::Rejected,
                reason: Some(reason.to_string()),
            })
            .await?;
        self.metrics.rejections.with_label_values(&[reason_label]).inc();
        let _ = self
            .integrations
            .telegram
            .notify_rejected(
                SourceNetwork::NineChronicles,
                &event.tx_id,
                &event.sender.to_string(),
                event.amount,
                reason,
            )
            .await;
        self.audit(event, None, NcgAmount::ZERO, NcgAmount::ZERO, ExchangeStatus::Rejected, Some(reason.to_string()))
            .await;
        Ok(())
    }

    /// Returns part of a deposit to its sender as a second history leg.
    /// A banned sender gets no refund; the suppression is only logged.
    async fn refund(
        &self,
        event: &NcgTransferredEvent,
        amount: NcgAmount,
        reason: &str,
    ) -> BridgeResult<()> {
        if self.policy.is_banned(&event.sender) {
            warn!(
                "[NcgDeposit] suppressing {} NCG refund to banned sender {} ({})",
                amount, event.sender, event.tx_id
            );
            return Ok(());
        }

        self.history
            .insert(&HistoryRecord {
                source_network: SourceNetwork::NineChronicles,
                source_tx_id: event.tx_id.clone(),
                log_index: 0,
                leg: ExchangeLeg::Refund,
                sink: event.sender.to_string(),
                requested: amount,
                sent: amount,
                counter_tx_id: None,
                status: ExchangeStatus::Refunded,
                reason: Some(reason.to_string()),
            })
            .await?;

        let memo = format!("refund of {}: {}", event.tx_id, reason);
        match self.transfer.transfer(event.sender, amount, Some(memo)).await {
            Ok(refund_tx) => {
                info!(
                    "[NcgDeposit] refunded {} NCG to {} ({})",
                    amount, event.sender, refund_tx
                );
                self.history
                    .set_counter_tx(
                        SourceNetwork::NineChronicles,
                        &event.tx_id,
                        0,
                        ExchangeLeg::Refund,
                        &refund_tx,
                    )
                    .await?;
                self.metrics
                    .emissions
                    .with_label_values(&["refund", "ok"])
                    .inc();
                let _ = self
                    .integrations
                    .telegram
                    .notify_refunded(
                        &event.tx_id,
                        &refund_tx,
                        &event.sender.to_string(),
                        amount,
                        reason,
                    )
                    .await;
            }
            Err(e) => {
                error!(
                    "[NcgDeposit] refund of {} NCG for {} failed: {}",
                    amount, event.tx_id, e
                );
                self.metrics
                    .emissions
                    .with_label_values(&["refund", "err"])
                    .inc();
                self.integrations
                    .pager
                    .trigger(
                        &format!("NCG refund failed for deposit {}", event.tx_id),
                        Severity::Critical,
                        serde_json::json!({
                            "source_tx_id": event.tx_id,
                            "sender": event.sender.to_string(),
                            "amount": amount.to_string(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
            }
        }
        Ok(())
    }

    async fn audit(
        &self,
        event: &NcgTransferredEvent,
        destination_tx_id: Option<String>,
        sent: NcgAmount,
        fee: NcgAmount,
        status: ExchangeStatus,
        reason: Option<String>,
    ) {
        self.integrations
            .audit
            .record(AuditDocument {
                source_network: SourceNetwork::NineChronicles.as_str(),
                source_tx_id: event.tx_id.clone(),
                destination_tx_id,
                sender: event.sender.to_string(),
                recipient: event.memo.clone().unwrap_or_default(),
                requested: event.amount.to_string(),
                sent: sent.to_string(),
                fee: fee.to_string(),
                status: status.as_str(),
                reason,
                timestamp_ms: crate::store::now_ms(),
            })
            .await;
    }
}

#[async_trait]
impl EventObserver<NcgTransferredEvent> for NcgDepositObserver {
    async fn observe(&self, envelope: &EventEnvelope<NcgTransferredEvent>) -> BridgeResult<()> {
        for event in &envelope.events {
            self.process(event).await?;
        }
        Ok(())
    }
}
