// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! EVM-side client: reads `Burn` logs from the wrapped-token contract and
//! submits mint transactions through a signing middleware, blocking on the
//! mined receipt so callers can record the destination transaction.

use crate::abi::{BurnFilter, WrappedNcg};
use crate::error::{BridgeError, BridgeResult};
use crate::gas_price::{CompositeGasPolicy, GasPricePolicy};
use crate::monitor::BlockSource;
use crate::types::BurnEvent;
use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer, Wallet};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address as EthAddress, BlockId, H256, U256, U64};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub type EthSigner = SignerMiddleware<Provider<Http>, Wallet<SigningKey>>;

/// A mined mint transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
}

/// The single write operation the deposit observer needs on the EVM side.
#[async_trait]
pub trait WncgMinter: Send + Sync {
    async fn mint(&self, recipient: EthAddress, amount: U256) -> BridgeResult<MintReceipt>;
}

pub struct EthClient {
    signer: Arc<EthSigner>,
    contract: WrappedNcg<EthSigner>,
    contract_address: EthAddress,
    gas_policy: CompositeGasPolicy,
    priority_fee: U256,
}

impl EthClient {
    pub async fn new(
        rpc_url: &str,
        minter_private_key_hex: &str,
        contract_address: EthAddress,
        gas_policy: CompositeGasPolicy,
        priority_fee: U256,
        expected_chain_id: Option<u64>,
    ) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)?
            .interval(Duration::from_millis(2000));
        let chain_id = provider.get_chainid().await?.as_u64();

        if let Some(expected) = expected_chain_id {
            anyhow::ensure!(
                chain_id == expected,
                "Chain ID mismatch: expected {}, got {}. This could indicate connecting to the wrong network!",
                expected,
                chain_id
            );
        }

        let wallet = minter_private_key_hex
            .parse::<LocalWallet>()?
            .with_chain_id(chain_id);
        let minter_address = wallet.address();
        let signer = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = WrappedNcg::new(contract_address, signer.clone());

        let block_number = signer.get_block_number().await?;
        tracing::info!(
            "[EthClient] connected to chain {}, current block {}, minter {:?}, contract {:?}",
            chain_id,
            block_number,
            minter_address,
            contract_address
        );

        Ok(Self {
            signer,
            contract,
            contract_address,
            gas_policy,
            priority_fee,
        })
    }

    pub fn contract_address(&self) -> EthAddress {
        self.contract_address
    }

    pub async fn latest_block(&self) -> BridgeResult<u64> {
        let number = self
            .signer
            .get_block_number()
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?;
        Ok(number.as_u64())
    }

    pub async fn block_hash(&self, index: u64) -> BridgeResult<H256> {
        let block = self
            .signer
            .get_block(index)
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?
            .ok_or_else(|| {
                BridgeError::ProviderError(format!("block {} not found", index))
            })?;
        block.hash.ok_or_else(|| {
            BridgeError::ProviderError(format!("provider returned block {} without hash", index))
        })
    }

    pub async fn block_index(&self, hash: H256) -> BridgeResult<u64> {
        let block = self
            .signer
            .get_block(BlockId::Hash(hash))
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?
            .ok_or_else(|| {
                BridgeError::ProviderError(format!("block {:?} not on the canonical chain", hash))
            })?;
        block
            .number
            .map(|n| n.as_u64())
            .ok_or_else(|| BridgeError::ProviderError("block without number".into()))
    }

    /// `Burn` logs of the watched contract in the given block, in intra-block
    /// order.
    pub async fn burn_events_in(&self, index: u64) -> BridgeResult<Vec<BurnEvent>> {
        let logs = self
            .contract
            .event::<BurnFilter>()
            .from_block(index)
            .to_block(index)
            .query_with_meta()
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?;

        let mut events: Vec<BurnEvent> = logs
            .into_iter()
            .map(|(burn, meta)| BurnEvent {
                tx_hash: meta.transaction_hash,
                block_hash: meta.block_hash,
                log_index: meta.log_index.as_u64(),
                sender: burn.sender,
                amount: burn.amount,
                to: burn.to,
            })
            .collect();
        events.sort_by_key(|e| e.log_index);
        Ok(events)
    }
}

#[async_trait]
impl WncgMinter for EthClient {
    async fn mint(&self, recipient: EthAddress, amount: U256) -> BridgeResult<MintReceipt> {
        let base_price = self
            .signer
            .get_gas_price()
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?;
        let effective = self.gas_policy.apply(base_price);
        let priority = self.priority_fee.min(effective);

        let mut call = self.contract.mint(recipient, amount);
        match &mut call.tx {
            TypedTransaction::Eip1559(tx) => {
                tx.max_fee_per_gas = Some(effective);
                tx.max_priority_fee_per_gas = Some(priority);
            }
            other => {
                other.set_gas_price(effective);
            }
        }

        let gas = call
            .estimate_gas()
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?;
        let call = call.gas(gas);

        tracing::info!(
            "[EthClient] minting {} base units to {:?} (gas_price={}, priority={}, gas={})",
            amount,
            recipient,
            effective,
            priority,
            gas
        );

        let pending = call
            .send()
            .await
            .map_err(|e| BridgeError::ProviderError(format!("mint submission failed: {}", e)))?;
        let receipt = pending
            .await
            .map_err(|e| BridgeError::TransientProviderError(e.to_string()))?
            .ok_or_else(|| {
                BridgeError::ProviderError("mint transaction dropped from the mempool".into())
            })?;

        if receipt.status != Some(U64::one()) {
            return Err(BridgeError::ProviderError(format!(
                "mint transaction {:?} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(MintReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default().as_u64(),
        })
    }
}

/// Block source over the wrapped-token contract, reporting a tip lowered by
/// the confirmation depth so no unfinalized burn is ever observed.
pub struct EthBurnSource {
    client: Arc<EthClient>,
    confirmations: u64,
}

impl EthBurnSource {
    pub fn new(client: Arc<EthClient>, confirmations: u64) -> Self {
        Self {
            client,
            confirmations,
        }
    }
}

fn parse_h256(hash: &str) -> BridgeResult<H256> {
    H256::from_str(hash.strip_prefix("0x").unwrap_or(hash))
        .map_err(|e| BridgeError::ProviderError(format!("invalid block hash {:?}: {}", hash, e)))
}

#[async_trait]
impl BlockSource for EthBurnSource {
    type Event = BurnEvent;

    fn name(&self) -> &'static str {
        "wncg-burn"
    }

    async fn tip_index(&self) -> BridgeResult<u64> {
        let latest = self.client.latest_block().await?;
        Ok(latest.saturating_sub(self.confirmations))
    }

    async fn block_hash(&self, index: u64) -> BridgeResult<String> {
        Ok(format!("{:?}", self.client.block_hash(index).await?))
    }

    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64> {
        self.client.block_index(parse_h256(block_hash)?).await
    }

    async fn events_in(&self, index: u64) -> BridgeResult<Vec<BurnEvent>> {
        self.client.burn_events_in(index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_h256_accepts_both_prefixes() {
        let bare = "71c02dd6b42a08a8c45458cb2087c5a11a91683eef5dfeeeb4d1d8bf267b4d56";
        let with_prefix = format!("0x{}", bare);
        assert_eq!(parse_h256(bare).unwrap(), parse_h256(&with_prefix).unwrap());
        assert!(parse_h256("0x1234").is_err());
    }

    #[test]
    fn test_mint_receipt_equality() {
        let a = MintReceipt {
            tx_hash: H256::repeat_byte(1),
            block_number: 7,
        };
        assert_eq!(
            a,
            MintReceipt {
                tx_hash: H256::repeat_byte(1),
                block_number: 7
            }
        );
    }
}
