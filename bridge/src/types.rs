// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core value types shared by the monitors, observers and stores.

use crate::error::{BridgeError, BridgeResult};
use ethers::types::{Address as EthAddress, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Base units of wNCG per centi-NCG: wNCG carries 18 decimals, NCG carries 2.
const WEI_PER_CENTI: u64 = 10_000_000_000_000_000;

/// NCG amount in fixed-point centi-units (the asset's on-chain precision is
/// two decimal places). All fee and refund arithmetic happens on the integer
/// representation so rounding is always DOWN and never accumulates drift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NcgAmount(u64);

impl NcgAmount {
    pub const ZERO: NcgAmount = NcgAmount(0);

    pub const fn from_centi(centi: u64) -> Self {
        NcgAmount(centi)
    }

    pub fn centi(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: NcgAmount) -> Option<NcgAmount> {
        self.0.checked_add(other.0).map(NcgAmount)
    }

    pub fn checked_sub(&self, other: NcgAmount) -> Option<NcgAmount> {
        self.0.checked_sub(other.0).map(NcgAmount)
    }

    pub fn saturating_sub(&self, other: NcgAmount) -> NcgAmount {
        NcgAmount(self.0.saturating_sub(other.0))
    }

    /// Fee for this amount at the given ratio in basis points, rounded down
    /// to the asset's two decimal places.
    pub fn fee(&self, basis_points: u64) -> NcgAmount {
        debug_assert!(basis_points <= 10_000);
        NcgAmount((self.0 as u128 * basis_points as u128 / 10_000) as u64)
    }

    /// The 18-decimal base-unit representation used by the wrapped token.
    pub fn to_wei(&self) -> U256 {
        U256::from(self.0) * U256::from(WEI_PER_CENTI)
    }

    /// Converts 18-decimal base units to centi-NCG, rounding DOWN. Anything
    /// below 0.01 NCG truncates to zero.
    pub fn from_wei_floor(wei: U256) -> BridgeResult<NcgAmount> {
        let centi = wei / U256::from(WEI_PER_CENTI);
        if centi > U256::from(u64::MAX) {
            return Err(BridgeError::AmountOverflow(format!(
                "{} base units exceed the representable NCG range",
                wei
            )));
        }
        Ok(NcgAmount(centi.as_u64()))
    }
}

impl fmt::Display for NcgAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for NcgAmount {
    type Err = BridgeError;

    fn from_str(s: &str) -> BridgeResult<Self> {
        let invalid = || BridgeError::AmountOverflow(format!("invalid NCG amount: {:?}", s));
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: u64 = int_part.parse().map_err(|_| invalid())?;
        // Trailing zeros past two decimal places are tolerated; significant
        // digits there are not representable on chain.
        let (kept, rest) = frac_part.split_at(frac_part.len().min(2));
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) || rest.bytes().any(|b| b != b'0') {
            return Err(invalid());
        }
        let frac = match kept.len() {
            0 => 0,
            1 => kept.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => kept.parse::<u64>().map_err(|_| invalid())?,
        };
        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac))
            .map(NcgAmount)
            .ok_or_else(invalid)
    }
}

/// 20-byte account address on the Nine Chronicles chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NcgAddress([u8; 20]);

impl NcgAddress {
    pub const fn new(bytes: [u8; 20]) -> Self {
        NcgAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for NcgAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NcgAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for NcgAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> BridgeResult<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw)
            .map_err(|_| BridgeError::Generic(format!("invalid address hex: {:?}", s)))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| BridgeError::Generic(format!("address is not 20 bytes: {:?}", s)))?;
        Ok(NcgAddress(bytes))
    }
}

/// Parses a deposit memo into the EVM recipient it designates.
pub fn parse_eth_recipient(memo: &str) -> BridgeResult<EthAddress> {
    let raw = memo.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw)
        .map_err(|_| BridgeError::InvalidRecipient(format!("memo is not hex: {:?}", memo)))?;
    if bytes.len() != 20 {
        return Err(BridgeError::InvalidRecipient(format!(
            "memo decodes to {} bytes, expected 20",
            bytes.len()
        )));
    }
    Ok(EthAddress::from_slice(&bytes))
}

/// Durable per-monitor processing boundary: the last fully processed block
/// and the last transaction handled inside it. Opaque hex strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLocation {
    pub block_hash: String,
    pub tx_id: String,
}

/// One block's worth of events, delivered to an observer atomically and in
/// on-chain intra-block order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventEnvelope<E> {
    pub block_hash: String,
    pub events: Vec<E>,
}

/// Anything a monitor can record a cursor for.
pub trait BridgeEvent {
    fn tx_id(&self) -> String;
}

/// An inbound NCG transfer to the custodial address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NcgTransferredEvent {
    pub tx_id: String,
    pub block_hash: String,
    pub sender: NcgAddress,
    pub amount: NcgAmount,
    pub memo: Option<String>,
}

impl BridgeEvent for NcgTransferredEvent {
    fn tx_id(&self) -> String {
        self.tx_id.clone()
    }
}

/// A `Burn` log emitted by the wrapped-token contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnEvent {
    pub tx_hash: H256,
    pub block_hash: H256,
    pub log_index: u64,
    pub sender: EthAddress,
    pub amount: U256,
    /// planet_id(6 bytes) || ncg_recipient(20 bytes) || pad(6 bytes)
    pub to: [u8; 32],
}

impl BurnEvent {
    /// Extracts the Nine Chronicles recipient, validating the planet prefix.
    pub fn parse_recipient(&self, planet_id: &[u8; 6]) -> BridgeResult<NcgAddress> {
        if &self.to[..6] != planet_id {
            return Err(BridgeError::InvalidRecipientTag(format!(
                "expected planet prefix 0x{}, got 0x{}",
                hex::encode(planet_id),
                hex::encode(&self.to[..6]),
            )));
        }
        let mut address = [0u8; 20];
        address.copy_from_slice(&self.to[6..26]);
        Ok(NcgAddress(address))
    }
}

impl BridgeEvent for BurnEvent {
    fn tx_id(&self) -> String {
        format!("{:?}", self.tx_hash)
    }
}

/// The side of the bridge a processed event originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceNetwork {
    NineChronicles,
    Ethereum,
}

impl SourceNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceNetwork::NineChronicles => "nineChronicles",
            SourceNetwork::Ethereum => "ethereum",
        }
    }

    pub fn parse(s: &str) -> BridgeResult<Self> {
        match s {
            "nineChronicles" => Ok(SourceNetwork::NineChronicles),
            "ethereum" => Ok(SourceNetwork::Ethereum),
            other => Err(BridgeError::StorageError(format!(
                "unknown source network: {:?}",
                other
            ))),
        }
    }
}

/// Terminal outcome of a processed source event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeStatus {
    Emitted,
    Refunded,
    Rejected,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Emitted => "emitted",
            ExchangeStatus::Refunded => "refunded",
            ExchangeStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> BridgeResult<Self> {
        match s {
            "emitted" => Ok(ExchangeStatus::Emitted),
            "refunded" => Ok(ExchangeStatus::Refunded),
            "rejected" => Ok(ExchangeStatus::Rejected),
            other => Err(BridgeError::StorageError(format!(
                "unknown exchange status: {:?}",
                other
            ))),
        }
    }
}

/// A source transaction can produce up to two history legs: the exchange
/// itself, and a refund issued back to the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeLeg {
    Exchange,
    Refund,
}

impl ExchangeLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeLeg::Exchange => "exchange",
            ExchangeLeg::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> BridgeResult<Self> {
        match s {
            "exchange" => Ok(ExchangeLeg::Exchange),
            "refund" => Ok(ExchangeLeg::Refund),
            other => Err(BridgeError::StorageError(format!(
                "unknown exchange leg: {:?}",
                other
            ))),
        }
    }
}

/// Durable evidence that a source event was observed and acted upon. The
/// presence of any leg for `(source_network, source_tx_id, log_index)` means
/// the event is already processed and must not be re-emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRecord {
    pub source_network: SourceNetwork,
    pub source_tx_id: String,
    pub log_index: u64,
    pub leg: ExchangeLeg,
    pub sink: String,
    pub requested: NcgAmount,
    pub sent: NcgAmount,
    pub counter_tx_id: Option<String>,
    pub status: ExchangeStatus,
    pub reason: Option<String>,
}
