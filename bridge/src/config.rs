// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Startup configuration. Every knob is an environment-settable CLI flag;
//! required keys without a value abort the process before anything touches
//! a chain.

use crate::audit::AuditConfig;
use crate::policy::ExchangePolicy;
use crate::telegram::TelegramConfig;
use crate::types::{NcgAddress, NcgAmount};
use anyhow::Context;
use clap::Parser;
use ethers::types::{Address as EthAddress, U256};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case", author, version)]
pub struct BridgeArgs {
    /// Primary GraphQL endpoint of the Nine Chronicles node
    #[clap(env = "NCG_GRAPHQL_URL", long)]
    pub ncg_graphql_url: String,
    /// Additional endpoints the signed transaction is also staged to
    #[clap(env = "NCG_STAGE_GRAPHQL_URLS", long, value_delimiter = ',')]
    pub ncg_stage_graphql_urls: Vec<String>,
    #[clap(env = "ETH_RPC_URL", long)]
    pub eth_rpc_url: String,
    /// Expected EVM chain id; refuses to start against another network
    #[clap(env = "ETH_CHAIN_ID", long)]
    pub eth_chain_id: Option<u64>,
    #[clap(env = "WNCG_CONTRACT_ADDRESS", long)]
    pub wncg_contract_address: String,
    #[clap(env = "ETH_MINTER_PRIVATE_KEY", long, hide_env_values = true)]
    pub eth_minter_private_key: String,
    /// Remote signing service for the custodial Chain-N key
    #[clap(env = "SIGNER_URL", long)]
    pub signer_url: String,
    #[clap(env = "SIGNER_KEY_ID", long)]
    pub signer_key_id: String,
    /// The custodial address deposits arrive at and refunds leave from.
    /// Must match the address derived from the remote signing key.
    #[clap(env = "BRIDGE_NCG_ADDRESS", long)]
    pub bridge_ncg_address: String,
    /// Official minter of the NCG currency, part of the transfer action
    #[clap(env = "NCG_MINTER_ADDRESS", long)]
    pub ncg_minter_address: String,
    /// Planet prefix expected in burn recipient tags
    #[clap(env = "PLANET_ID", long, default_value = "0x100000000001")]
    pub planet_id: String,
    #[clap(env = "CURSOR_STORE_PATH", long, default_value = "bridge-cursor.db")]
    pub cursor_store_path: PathBuf,
    #[clap(env = "HISTORY_STORE_PATH", long, default_value = "bridge-history.db")]
    pub history_store_path: PathBuf,
    #[clap(env = "MIN_EXCHANGE_NCG", long)]
    pub min_exchange_ncg: String,
    #[clap(env = "MAX_EXCHANGE_NCG", long)]
    pub max_exchange_ncg: String,
    #[clap(env = "EXCHANGE_FEE_BASIS_POINTS", long, default_value_t = 100)]
    pub exchange_fee_basis_points: u64,
    #[clap(env = "CONFIRMATIONS", long, default_value_t = 10)]
    pub confirmations: u64,
    #[clap(env = "POLL_DELAY_MS", long, default_value_t = 15_000)]
    pub poll_delay_ms: u64,
    /// Gas tip ratio in per-mille (1300 pays 1.3x the quoted price)
    #[clap(env = "GAS_TIP_PER_MILLE", long, default_value_t = 1_300)]
    pub gas_tip_per_mille: u64,
    #[clap(env = "GAS_PRICE_CAP_GWEI", long, default_value_t = 300)]
    pub gas_price_cap_gwei: u64,
    #[clap(env = "PRIORITY_FEE_GWEI", long, default_value_t = 2)]
    pub priority_fee_gwei: u64,
    /// Senders whose deposits are rejected outright
    #[clap(env = "BANNED_SENDERS", long, value_delimiter = ',')]
    pub banned_senders: Vec<String>,
    #[clap(env = "PAGERDUTY_ROUTING_KEY", long)]
    pub pagerduty_routing_key: Option<String>,
    #[clap(env = "TELEGRAM_BOT_TOKEN", long, hide_env_values = true)]
    pub telegram_bot_token: Option<String>,
    #[clap(env = "TELEGRAM_CHAT_ID", long)]
    pub telegram_chat_id: Option<String>,
    #[clap(env = "AUDIT_URL", long)]
    pub audit_url: Option<String>,
    #[clap(env = "AUDIT_INDEX", long, default_value = "ncg-bridge-exchanges")]
    pub audit_index: String,
    #[clap(env = "AUDIT_USERNAME", long)]
    pub audit_username: Option<String>,
    #[clap(env = "AUDIT_PASSWORD", long, hide_env_values = true)]
    pub audit_password: Option<String>,
    #[clap(env = "METRICS_ADDRESS", long, default_value = "0.0.0.0:9184")]
    pub metrics_address: SocketAddr,
}

/// Parsed and validated configuration the node runs on.
pub struct BridgeConfig {
    pub ncg_graphql_url: String,
    pub ncg_stage_graphql_urls: Vec<String>,
    pub eth_rpc_url: String,
    pub eth_chain_id: Option<u64>,
    pub wncg_contract_address: EthAddress,
    pub eth_minter_private_key: String,
    pub signer_url: String,
    pub signer_key_id: String,
    pub bridge_ncg_address: NcgAddress,
    pub ncg_minter_address: NcgAddress,
    pub planet_id: [u8; 6],
    pub cursor_store_path: PathBuf,
    pub history_store_path: PathBuf,
    pub policy: ExchangePolicy,
    pub confirmations: u64,
    pub poll_delay: Duration,
    pub gas_tip_per_mille: u64,
    pub gas_price_cap: U256,
    pub priority_fee: U256,
    pub telegram: TelegramConfig,
    pub pagerduty_routing_key: Option<String>,
    pub audit: AuditConfig,
    pub metrics_address: SocketAddr,
}

pub fn parse_planet_id(raw: &str) -> anyhow::Result<[u8; 6]> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(stripped).context("planet id is not hex")?;
    bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("planet id must be exactly 6 bytes: {:?}", raw))
}

fn gwei(n: u64) -> U256 {
    U256::from(n) * U256::exp10(9)
}

impl BridgeConfig {
    pub fn from_args(args: BridgeArgs) -> anyhow::Result<Self> {
        let wncg_contract_address: EthAddress = args
            .wncg_contract_address
            .parse()
            .context("invalid wrapped-token contract address")?;
        let bridge_ncg_address: NcgAddress = args
            .bridge_ncg_address
            .parse()
            .context("invalid custodial bridge address")?;
        let ncg_minter_address: NcgAddress = args
            .ncg_minter_address
            .parse()
            .context("invalid NCG currency minter address")?;
        let planet_id = parse_planet_id(&args.planet_id)?;

        let minimum: NcgAmount = args
            .min_exchange_ncg
            .parse()
            .context("invalid minimum exchange amount")?;
        let maximum: NcgAmount = args
            .max_exchange_ncg
            .parse()
            .context("invalid maximum exchange amount")?;
        let banned = args
            .banned_senders
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<NcgAddress>().context("invalid banned sender address"))
            .collect::<anyhow::Result<_>>()?;
        let policy = ExchangePolicy::new(banned, minimum, maximum, args.exchange_fee_basis_points)?;

        let telegram = TelegramConfig {
            bot_token: args.telegram_bot_token.unwrap_or_default(),
            chat_id: args.telegram_chat_id.unwrap_or_default(),
        };
        let audit = AuditConfig {
            endpoint: args.audit_url,
            index: args.audit_index,
            username: args.audit_username,
            password: args.audit_password,
        };

        Ok(Self {
            ncg_graphql_url: args.ncg_graphql_url,
            ncg_stage_graphql_urls: args
                .ncg_stage_graphql_urls
                .into_iter()
                .filter(|u| !u.is_empty())
                .collect(),
            eth_rpc_url: args.eth_rpc_url,
            eth_chain_id: args.eth_chain_id,
            wncg_contract_address,
            eth_minter_private_key: args.eth_minter_private_key,
            signer_url: args.signer_url,
            signer_key_id: args.signer_key_id,
            bridge_ncg_address,
            ncg_minter_address,
            planet_id,
            cursor_store_path: args.cursor_store_path,
            history_store_path: args.history_store_path,
            policy,
            confirmations: args.confirmations,
            poll_delay: Duration::from_millis(args.poll_delay_ms),
            gas_tip_per_mille: args.gas_tip_per_mille,
            gas_price_cap: gwei(args.gas_price_cap_gwei),
            priority_fee: gwei(args.priority_fee_gwei),
            telegram,
            pagerduty_routing_key: args.pagerduty_routing_key,
            audit,
            metrics_address: args.metrics_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> BridgeArgs {
        BridgeArgs {
            ncg_graphql_url: "http://9c.internal/graphql".into(),
            ncg_stage_graphql_urls: vec![
                "http://9c-a.internal/graphql".into(),
                String::new(),
                "http://9c-b.internal/graphql".into(),
            ],
            eth_rpc_url: "http://geth.internal:8545".into(),
            eth_chain_id: Some(1),
            wncg_contract_address: "0xf203ca1769ca8e9e8fe1da9d147db68b6c919817".into(),
            eth_minter_private_key: "00".repeat(32),
            signer_url: "http://signer.internal".into(),
            signer_key_id: "bridge-key".into(),
            bridge_ncg_address: "0x9093dd96c4bb6b44a9e0a522e2de49641f146223".into(),
            ncg_minter_address: "0x47d082a115c63e7b58b1532d20e631538eafadde".into(),
            planet_id: "0x100000000001".into(),
            cursor_store_path: "cursor.db".into(),
            history_store_path: "history.db".into(),
            min_exchange_ncg: "100.00".into(),
            max_exchange_ncg: "5000.00".into(),
            exchange_fee_basis_points: 100,
            confirmations: 10,
            poll_delay_ms: 15_000,
            gas_tip_per_mille: 1_300,
            gas_price_cap_gwei: 300,
            priority_fee_gwei: 2,
            banned_senders: vec!["0x0000000000000000000000000000000000000bad".into()],
            pagerduty_routing_key: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            audit_url: None,
            audit_index: "ncg-bridge-exchanges".into(),
            audit_username: None,
            audit_password: None,
            metrics_address: "0.0.0.0:9184".parse().unwrap(),
        }
    }

    #[test]
    fn test_parse_planet_id() {
        assert_eq!(
            parse_planet_id("0x100000000001").unwrap(),
            [0x10, 0x00, 0x00, 0x00, 0x00, 0x01]
        );
        assert_eq!(parse_planet_id("100000000001").unwrap()[5], 0x01);
        assert!(parse_planet_id("0x10").is_err());
        assert!(parse_planet_id("planet").is_err());
    }

    #[test]
    fn test_from_args() {
        let config = BridgeConfig::from_args(sample_args()).unwrap();
        assert_eq!(config.planet_id, [0x10, 0, 0, 0, 0, 0x01]);
        // empty staging entries are dropped
        assert_eq!(config.ncg_stage_graphql_urls.len(), 2);
        assert_eq!(config.gas_price_cap, U256::from(300u64) * U256::exp10(9));
        assert_eq!(config.poll_delay, Duration::from_millis(15_000));
        assert!(config
            .policy
            .is_banned(&"0x0000000000000000000000000000000000000bad".parse().unwrap()));
        assert!(!config.telegram.is_configured());
        assert!(!config.audit.is_configured());
    }

    #[test]
    fn test_from_args_rejects_bad_bounds() {
        let mut args = sample_args();
        args.min_exchange_ncg = "5000.00".into();
        args.max_exchange_ncg = "100.00".into();
        assert!(BridgeConfig::from_args(args).is_err());
    }

    #[test]
    fn test_from_args_rejects_bad_addresses() {
        let mut args = sample_args();
        args.bridge_ncg_address = "0x1234".into();
        assert!(BridgeConfig::from_args(args).is_err());
    }
}
