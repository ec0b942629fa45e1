// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Composable gas-price shaping for the mint path. Each policy transforms a
//! base price into the next value; the composite applies them left to right.

use ethers::types::U256;

pub trait GasPricePolicy: Send + Sync {
    fn apply(&self, base: U256) -> U256;
}

/// Multiplies the price by a ratio expressed in per-mille, rounding down.
/// 1500 means +50%.
pub struct TipPolicy {
    per_mille: u64,
}

impl TipPolicy {
    pub fn new(per_mille: u64) -> Self {
        Self { per_mille }
    }
}

impl GasPricePolicy for TipPolicy {
    fn apply(&self, base: U256) -> U256 {
        base.saturating_mul(U256::from(self.per_mille)) / U256::from(1_000u64)
    }
}

/// Hard cap: never pay more than the configured ceiling.
pub struct LimitPolicy {
    cap: U256,
}

impl LimitPolicy {
    pub fn new(cap: U256) -> Self {
        Self { cap }
    }
}

impl GasPricePolicy for LimitPolicy {
    fn apply(&self, base: U256) -> U256 {
        base.min(self.cap)
    }
}

/// Left-to-right composition of policies.
pub struct CompositeGasPolicy {
    policies: Vec<Box<dyn GasPricePolicy>>,
}

impl CompositeGasPolicy {
    pub fn new(policies: Vec<Box<dyn GasPricePolicy>>) -> Self {
        Self { policies }
    }

    /// The standard shape: tip first, then clamp to the cap.
    pub fn standard(tip_per_mille: u64, cap: U256) -> Self {
        Self::new(vec![
            Box::new(TipPolicy::new(tip_per_mille)),
            Box::new(LimitPolicy::new(cap)),
        ])
    }
}

impl GasPricePolicy for CompositeGasPolicy {
    fn apply(&self, base: U256) -> U256 {
        self.policies
            .iter()
            .fold(base, |price, policy| policy.apply(price))
    }
}
