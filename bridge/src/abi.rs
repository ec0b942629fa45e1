// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Generated bindings for the wrapped-token contract. Only the surface the
//! bridge touches is declared: the minter entry point, the balance view and
//! the `Burn` log it watches for.

use ethers::contract::abigen;

abigen!(
    WrappedNcg,
    r#"[
        function mint(address account, uint256 amount)
        function balanceOf(address account) external view returns (uint256)
        event Burn(address indexed sender, bytes32 indexed to, uint256 amount)
    ]"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::contract::EthEvent;

    #[test]
    fn test_burn_event_signature() {
        assert_eq!(BurnFilter::name(), "Burn");
        assert_eq!(BurnFilter::abi_signature(), "Burn(address,bytes32,uint256)");
        // topic0 is the keccak of the abi signature
        assert_eq!(
            BurnFilter::signature(),
            ethers::core::utils::keccak256(BurnFilter::abi_signature().as_bytes()).into()
        );
    }
}
