// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exchange admission rules: banned senders, amount clamping and the fee
//! ratio. All of these are immutable once the node has started.

use crate::types::{NcgAddress, NcgAmount};
use std::collections::HashSet;

/// Outcome of checking a requested amount against the configured bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmountCheck {
    /// Below the minimum; the whole deposit is rejected (and refundable).
    TooSmall,
    /// Within bounds; exchange the full amount.
    Within,
    /// Above the maximum; exchange the maximum and refund the excess.
    OverMax { excess: NcgAmount },
}

#[derive(Clone, Debug)]
pub struct ExchangePolicy {
    banned: HashSet<NcgAddress>,
    minimum: NcgAmount,
    maximum: NcgAmount,
    fee_basis_points: u64,
}

impl ExchangePolicy {
    pub fn new(
        banned: HashSet<NcgAddress>,
        minimum: NcgAmount,
        maximum: NcgAmount,
        fee_basis_points: u64,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            minimum <= maximum,
            "minimum exchange amount {} exceeds maximum {}",
            minimum,
            maximum
        );
        anyhow::ensure!(
            fee_basis_points < 10_000,
            "fee of {} basis points would consume the whole exchange",
            fee_basis_points
        );
        Ok(Self {
            banned,
            minimum,
            maximum,
            fee_basis_points,
        })
    }

    pub fn is_banned(&self, sender: &NcgAddress) -> bool {
        self.banned.contains(sender)
    }

    pub fn maximum(&self) -> NcgAmount {
        self.maximum
    }

    pub fn evaluate(&self, amount: NcgAmount) -> AmountCheck {
        if amount < self.minimum {
            AmountCheck::TooSmall
        } else if amount > self.maximum {
            AmountCheck::OverMax {
                excess: amount.saturating_sub(self.maximum),
            }
        } else {
            AmountCheck::Within
        }
    }

    /// Fee taken from the exchanged amount, floored to two decimal places.
    pub fn fee_for(&self, amount: NcgAmount) -> NcgAmount {
        amount.fee(self.fee_basis_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(banned: &[&str], min: &str, max: &str, bp: u64) -> ExchangePolicy {
        ExchangePolicy::new(
            banned.iter().map(|s| s.parse().unwrap()).collect(),
            min.parse().unwrap(),
            max.parse().unwrap(),
            bp,
        )
        .unwrap()
    }

    #[test]
    fn test_ban_list() {
        let bad = "0x47d082a115c63e7b58b1532d20e631538eafadde";
        let p = policy(&[bad], "0.01", "100.00", 100);
        assert!(p.is_banned(&bad.parse().unwrap()));
        assert!(!p.is_banned(
            &"0x0000000000000000000000000000000000000001".parse().unwrap()
        ));
    }

    #[test]
    fn test_amount_clamping() {
        let p = policy(&[], "100.00", "5000.00", 100);
        assert_eq!(p.evaluate("99.99".parse().unwrap()), AmountCheck::TooSmall);
        assert_eq!(p.evaluate("100.00".parse().unwrap()), AmountCheck::Within);
        assert_eq!(p.evaluate("5000.00".parse().unwrap()), AmountCheck::Within);
        assert_eq!(
            p.evaluate("5000.01".parse().unwrap()),
            AmountCheck::OverMax {
                excess: "0.01".parse().unwrap()
            }
        );
    }

    /// 150.00 against MAX=100.00 at 1%: exchange 100.00, fee 1.00, send
    /// 99.00, refund 50.00 — and the legs sum back to the request.
    #[test]
    fn test_over_max_with_fee_arithmetic() {
        let p = policy(&[], "0.01", "100.00", 100);
        let requested: NcgAmount = "150.00".parse().unwrap();

        let AmountCheck::OverMax { excess } = p.evaluate(requested) else {
            panic!("expected OverMax");
        };
        assert_eq!(excess, "50.00".parse::<NcgAmount>().unwrap());

        let effective = p.maximum();
        let fee = p.fee_for(effective);
        let sent = effective.checked_sub(fee).unwrap();
        assert_eq!(fee, "1.00".parse::<NcgAmount>().unwrap());
        assert_eq!(sent, "99.00".parse::<NcgAmount>().unwrap());

        // requested = sent + fee + refund
        let total = sent
            .checked_add(fee)
            .and_then(|t| t.checked_add(excess))
            .unwrap();
        assert_eq!(total, requested);
    }

    #[test]
    fn test_constructor_rejects_inverted_bounds() {
        assert!(ExchangePolicy::new(
            HashSet::new(),
            "10.00".parse().unwrap(),
            "1.00".parse().unwrap(),
            100,
        )
        .is_err());
        assert!(ExchangePolicy::new(
            HashSet::new(),
            "1.00".parse().unwrap(),
            "10.00".parse().unwrap(),
            10_000,
        )
        .is_err());
    }
}
