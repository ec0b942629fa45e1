// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Telegram notifications for humans watching the bridge. Observers call
//! the notifier directly when something worth telling an operator happens;
//! an unconfigured notifier logs the message instead of sending it, so the
//! pipeline never depends on the chat integration being up.

use anyhow::Result;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{NcgAmount, SourceNetwork};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECS: u64 = 2;

#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
    api_base: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("configured", &self.is_configured())
            .field("api_base", &"<redacted>")
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        let api_base = format!("https://api.telegram.org/bot{}", config.bot_token);
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            config,
            client,
            api_base,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a raw message to Telegram
    pub async fn send_message(&self, text: &str) -> Result<()> {
        if !self.is_configured() {
            info!(
                "Telegram not configured, would send: {}",
                &text[..text.len().min(200)]
            );
            return Ok(());
        }

        for attempt in 0..MAX_RETRIES {
            match self
                .client
                .post(format!("{}/sendMessage", self.api_base))
                .json(&json!({
                    "chat_id": self.config.chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }))
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    warn!(
                        "Telegram send attempt {}/{} failed: {}",
                        attempt + 1,
                        MAX_RETRIES,
                        resp.status()
                    );
                }
                Err(e) => {
                    warn!(
                        "Telegram send attempt {}/{} failed: {:?}",
                        attempt + 1,
                        MAX_RETRIES,
                        e
                    );
                }
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECS * (attempt as u64 + 1)))
                    .await;
            }
        }

        warn!(
            "Failed to send Telegram message after {} attempts",
            MAX_RETRIES
        );
        Ok(())
    }

    pub async fn notify_startup(&self, custodial_address: &str, wncg_contract: &str) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> ℹ️\n\
            🚀 <b>Bridge Started</b>\n\n\
            <b>Watching:</b>\n\
            • NCG deposits to <code>{}</code>\n\
            • wNCG burns on <code>{}</code>",
            Self::truncate_addr(custodial_address),
            Self::truncate_addr(wncg_contract)
        );
        self.send_message(&message).await
    }

    /// A deposit was exchanged into a wrapped-token mint.
    pub async fn notify_minted(
        &self,
        source_tx_id: &str,
        mint_tx_id: &str,
        sender: &str,
        recipient: &str,
        requested: NcgAmount,
        sent: NcgAmount,
        fee: NcgAmount,
    ) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> ✅\n\
            🌉 <b>NCG → wNCG</b>\n\n\
            <b>Requested:</b> {} NCG\n\
            <b>Minted:</b> {} wNCG\n\
            <b>Fee:</b> {} NCG\n\
            <b>From:</b> <code>{}</code>\n\
            <b>To:</b> <code>{}</code>\n\n\
            <b>Deposit Tx:</b> <code>{}</code>\n\
            <b>Mint Tx:</b> <code>{}</code>",
            requested,
            sent,
            fee,
            Self::truncate_addr(sender),
            Self::truncate_addr(recipient),
            source_tx_id,
            mint_tx_id
        );
        self.send_message(&message).await
    }

    /// A burn was exchanged into a native transfer.
    pub async fn notify_transferred(
        &self,
        burn_tx_id: &str,
        transfer_tx_id: &str,
        recipient: &str,
        amount: NcgAmount,
    ) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> ✅\n\
            🌉 <b>wNCG → NCG</b>\n\n\
            <b>Amount:</b> {} NCG\n\
            <b>Recipient:</b> <code>{}</code>\n\n\
            <b>Burn Tx:</b> <code>{}</code>\n\
            <b>Transfer Tx:</b> <code>{}</code>",
            amount,
            Self::truncate_addr(recipient),
            burn_tx_id,
            transfer_tx_id
        );
        self.send_message(&message).await
    }

    pub async fn notify_rejected(
        &self,
        network: SourceNetwork,
        source_tx_id: &str,
        sender: &str,
        amount: NcgAmount,
        reason: &str,
    ) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> 🚫\n\
            <b>Exchange Rejected</b>\n\n\
            <b>Network:</b> {}\n\
            <b>Sender:</b> <code>{}</code>\n\
            <b>Amount:</b> {} \n\
            <b>Reason:</b> {}\n\n\
            <b>Tx:</b> <code>{}</code>",
            network.as_str(),
            Self::truncate_addr(sender),
            amount,
            reason,
            source_tx_id
        );
        self.send_message(&message).await
    }

    pub async fn notify_refunded(
        &self,
        source_tx_id: &str,
        refund_tx_id: &str,
        recipient: &str,
        amount: NcgAmount,
        reason: &str,
    ) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> ↩️\n\
            <b>Refund Issued</b>\n\n\
            <b>Amount:</b> {} NCG\n\
            <b>Recipient:</b> <code>{}</code>\n\
            <b>Reason:</b> {}\n\n\
            <b>Deposit Tx:</b> <code>{}</code>\n\
            <b>Refund Tx:</b> <code>{}</code>",
            amount,
            Self::truncate_addr(recipient),
            reason,
            source_tx_id,
            refund_tx_id
        );
        self.send_message(&message).await
    }

    pub async fn notify_stalled(&self, monitor: &str, latest: u64, minutes: u64) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> ⚠️\n\
            ⏱ <b>Monitor Stalled</b>\n\n\
            <b>Monitor:</b> {}\n\
            <b>Last processed block:</b> {}\n\
            <b>Stalled for:</b> {} minutes",
            monitor, latest, minutes
        );
        self.send_message(&message).await
    }

    /// The stored cursor block fell off the canonical chain: the monitor is
    /// aborting and someone has to reposition the cursor by hand.
    pub async fn notify_reorg(&self, monitor: &str, block_hash: &str) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> ⚠️\n\
            🔄 <b>Chain Reorganization Detected</b>\n\n\
            <b>Monitor:</b> {}\n\
            <b>Cursor Block:</b> <code>{}</code>\n\n\
            ⚠️ <i>The cursor block is no longer canonical. Previously emitted \
            actions are NOT rolled back; operator intervention required.</i>",
            monitor, block_hash
        );
        self.send_message(&message).await
    }

    pub async fn notify_fatal(&self, monitor: &str, error: &str) -> Result<()> {
        let message = format!(
            "<b>[NCG Bridge]</b> 🚨\n\
            💥 <b>Monitor Aborted</b>\n\n\
            <b>Monitor:</b> {}\n\
            <b>Error:</b> <code>{}</code>\n\n\
            ⚠️ <i>Operator intervention required.</i>",
            monitor, error
        );
        self.send_message(&message).await
    }

    fn truncate_addr(addr: &str) -> String {
        if addr.len() > 20 {
            format!("{}...{}", &addr[..10], &addr[addr.len() - 8..])
        } else {
            addr.to_string()
        }
    }
}

/// Shared notifier handle.
pub type SharedTelegramNotifier = Arc<TelegramNotifier>;

pub fn create_telegram_notifier(config: TelegramConfig) -> SharedTelegramNotifier {
    Arc::new(TelegramNotifier::new(config))
}
