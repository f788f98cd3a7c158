//! Static deployment gas heuristics.
//!
//! Figures are rough per-type baselines with a jurisdiction surcharge for the
//! extra compliance logic; no chain is queried.

use crate::{ContractType, Jurisdiction};

/// Used when the contract type is not recognised.
pub const DEFAULT_GAS: u64 = 1_500_000;

pub fn base_gas(contract_type: ContractType) -> u64 {
    match contract_type {
        ContractType::Escrow => 1_500_000,
        ContractType::Insurance => 2_000_000,
        ContractType::Settlement => 1_800_000,
    }
}

pub fn estimate(contract_type: ContractType, jurisdiction: Jurisdiction) -> u64 {
    use ContractType::*;
    use Jurisdiction::*;
    match (contract_type, jurisdiction) {
        (Escrow, India) => 1_600_000,
        (Escrow, Eu) => 1_700_000,
        (Escrow, Us) => 1_650_000,
        (Insurance, India) => 2_100_000,
        (Insurance, Eu) => 2_200_000,
        (Insurance, Us) => 2_150_000,
        (Settlement, India) => 1_900_000,
        (Settlement, Eu) => 2_000_000,
        (Settlement, Us) => 1_950_000,
    }
}

/// Lenient lookup for untyped input: unknown type falls back to
/// [`DEFAULT_GAS`], unknown jurisdiction to the type's base figure.
pub fn estimate_raw(contract_type: &str, jurisdiction: &str) -> u64 {
    match (
        contract_type.parse::<ContractType>(),
        jurisdiction.parse::<Jurisdiction>(),
    ) {
        (Ok(t), Ok(j)) => estimate(t, j),
        (Ok(t), Err(_)) => base_gas(t),
        (Err(_), _) => DEFAULT_GAS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jurisdiction_surcharge_exceeds_base() {
        for t in ContractType::ALL {
            for j in Jurisdiction::ALL {
                assert!(estimate(t, j) > base_gas(t), "{t}/{j}");
            }
        }
    }

    #[test]
    fn raw_lookup_falls_back() {
        assert_eq!(estimate_raw("ESCROW", "eu"), 1_700_000);
        assert_eq!(estimate_raw("insurance", "mars"), 2_000_000);
        assert_eq!(estimate_raw("loan", "us"), DEFAULT_GAS);
        assert_eq!(estimate_raw("", ""), DEFAULT_GAS);
    }
}
