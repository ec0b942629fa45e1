// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Serialized Chain-N transfer path.
//!
//! The custodial account's transaction nonce is assigned by the node when
//! the unsigned transaction is built, so two concurrent builds would race
//! and collide. One mutex therefore serializes every transfer and refund
//! across both observers: build, sign, attach, stage all happen under the
//! guard, and the error (if any) propagates only after it is released.

use crate::encoding::{encode, BencodexKey, BencodexValue};
use crate::error::{BridgeError, BridgeResult};
use crate::remote_signer::TxSigner;
use crate::nine_client::NineNode;
use crate::types::{NcgAddress, NcgAmount};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The write operation both observers need on the Chain-N side.
#[async_trait]
pub trait NcgTransfer: Send + Sync {
    /// Transfers `amount` from the custodial account to `recipient`,
    /// returning the transaction id.
    async fn transfer(
        &self,
        recipient: NcgAddress,
        amount: NcgAmount,
        memo: Option<String>,
    ) -> BridgeResult<String>;
}

pub struct NcgTransferSender {
    // serializes build+sign+stage; the node assigns nonces at build time
    guard: Mutex<()>,
    primary: Arc<dyn NineNode>,
    stagers: Vec<Arc<dyn NineNode>>,
    signer: Arc<dyn TxSigner>,
    sender_address: NcgAddress,
    public_key_base64: String,
    currency_minter: NcgAddress,
}

impl NcgTransferSender {
    /// `stagers` must contain every endpoint the signed transaction should
    /// be broadcast to, the primary included.
    pub fn new(
        primary: Arc<dyn NineNode>,
        stagers: Vec<Arc<dyn NineNode>>,
        signer: Arc<dyn TxSigner>,
        sender_address: NcgAddress,
        public_key: &[u8],
        currency_minter: NcgAddress,
    ) -> Self {
        Self {
            guard: Mutex::new(()),
            primary,
            stagers,
            signer,
            sender_address,
            public_key_base64: BASE64.encode(public_key),
            currency_minter,
        }
    }

    /// Broadcasts the signed transaction to every endpoint concurrently.
    /// One acceptance is success; per-endpoint failures are logged.
    async fn stage_everywhere(&self, signed_tx: &[u8]) -> BridgeResult<()> {
        let payload = BASE64.encode(signed_tx);
        let attempts = self.stagers.iter().map(|node| {
            let payload = payload.clone();
            async move { (node.endpoint().to_string(), node.stage_transaction(&payload).await) }
        });
        let results = futures::future::join_all(attempts).await;

        let mut accepted = 0usize;
        for (endpoint, result) in results {
            match result {
                Ok(true) => accepted += 1,
                Ok(false) => {
                    tracing::warn!("[NcgTransfer] {} refused the staged transaction", endpoint)
                }
                Err(e) => {
                    tracing::warn!("[NcgTransfer] staging to {} failed: {}", endpoint, e)
                }
            }
        }

        if accepted == 0 {
            return Err(BridgeError::StageFailed(format!(
                "all {} staging endpoints rejected the transaction",
                self.stagers.len()
            )));
        }
        tracing::info!(
            "[NcgTransfer] staged to {}/{} endpoints",
            accepted,
            self.stagers.len()
        );
        Ok(())
    }

    async fn transfer_locked(
        &self,
        recipient: NcgAddress,
        amount: NcgAmount,
        memo: Option<String>,
    ) -> BridgeResult<String> {
        let action = transfer_asset_plain_value(
            self.sender_address,
            recipient,
            amount,
            self.currency_minter,
            memo.as_deref(),
        );
        let plain_value_base64 = BASE64.encode(encode(&action));

        let unsigned_tx = self
            .primary
            .create_unsigned_transaction(&plain_value_base64, &self.public_key_base64)
            .await?;
        let signature = self.signer.sign(&unsigned_tx).await?;
        let signed_tx = self.primary.attach_signature(&unsigned_tx, &signature).await?;

        self.stage_everywhere(&signed_tx).await?;

        Ok(hex::encode(Sha256::digest(&signed_tx)))
    }
}

#[async_trait]
impl NcgTransfer for NcgTransferSender {
    async fn transfer(
        &self,
        recipient: NcgAddress,
        amount: NcgAmount,
        memo: Option<String>,
    ) -> BridgeResult<String> {
        let _guard = self.guard.lock().await;
        tracing::info!(
            "[NcgTransfer] transferring {} NCG to {} (memo: {:?})",
            amount,
            recipient,
            memo
        );
        let result = self.transfer_locked(recipient, amount, memo).await;
        if let Ok(tx_id) = &result {
            tracing::info!("[NcgTransfer] staged transfer {}", tx_id);
        }
        result
    }
}

/// The `transfer_asset3` plain value:
/// `{type_id, values: {amount: [currency, integer], memo?, recipient, sender}}`
/// with the currency carrying two decimal places, the single official
/// minter, and the NCG ticker. The integer is the centi-unit amount.
pub fn transfer_asset_plain_value(
    sender: NcgAddress,
    recipient: NcgAddress,
    amount: NcgAmount,
    currency_minter: NcgAddress,
    memo: Option<&str>,
) -> BencodexValue {
    let mut currency = BTreeMap::new();
    currency.insert(
        BencodexKey::Text("decimalPlaces".into()),
        BencodexValue::binary(vec![0x02]),
    );
    currency.insert(
        BencodexKey::Text("minters".into()),
        BencodexValue::List(vec![BencodexValue::binary(
            currency_minter.as_bytes().to_vec(),
        )]),
    );
    currency.insert(
        BencodexKey::Text("ticker".into()),
        BencodexValue::text("NCG"),
    );

    let mut values = BTreeMap::new();
    values.insert(
        BencodexKey::Text("amount".into()),
        BencodexValue::List(vec![
            BencodexValue::Dictionary(currency),
            BencodexValue::Integer(amount.centi() as i128),
        ]),
    );
    if let Some(memo) = memo {
        values.insert(BencodexKey::Text("memo".into()), BencodexValue::text(memo));
    }
    values.insert(
        BencodexKey::Text("recipient".into()),
        BencodexValue::binary(recipient.as_bytes().to_vec()),
    );
    values.insert(
        BencodexKey::Text("sender".into()),
        BencodexValue::binary(sender.as_bytes().to_vec()),
    );

    let mut action = BTreeMap::new();
    action.insert(
        BencodexKey::Text("type_id".into()),
        BencodexValue::text("transfer_asset3"),
    );
    action.insert(
        BencodexKey::Text("values".into()),
        BencodexValue::Dictionary(values),
    );
    BencodexValue::Dictionary(action)
}
