//! Canonical signed representation of a money movement, as transmitted to
//! the external ledger. Pure data and hashing; no I/O.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Sentinel owner ref for system/treasury wallets on the wire.
/// Keeps transfers touching the treasury hash-stable regardless of which
/// internal id represents it at a given time.
pub const ROOT_REF: &str = "root";

/// The set of reserved wallet refs that canonicalize to [`ROOT_REF`]
#[derive(Debug, Default, Clone)]
pub struct SystemWallets {
    reserved: HashSet<String>,
}

impl SystemWallets {
    pub fn new(reserved: impl IntoIterator<Item = String>) -> Self {
        Self {
            reserved: reserved.into_iter().collect(),
        }
    }

    pub fn is_reserved(&self, owner_ref: &str) -> bool {
        self.reserved.contains(owner_ref)
    }

    pub fn canonical_ref<'a>(&self, owner_ref: &'a str) -> &'a str {
        if self.is_reserved(owner_ref) {
            ROOT_REF
        } else {
            owner_ref
        }
    }
}

/// Convert a decimal major-unit amount to integer minor units (x100),
/// rounding midpoints away from zero so 12.345 becomes 1235.
/// Returns None for negative or non-representable amounts; callers reject
/// those before constructing a transaction.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Convert integer minor units back to a 2dp decimal at the persistence boundary
pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// A transfer shaped for the external ledger's TX_NEW event.
///
/// `hash` commits to (payer_ref, payee_ref, amount, fee) and nothing else, so
/// the receiving ledger can verify integrity; `signature` additionally embeds
/// the caller-supplied reference so replays under a different reference are
/// distinguishable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HashChainTransaction {
    pub payer_ref: String,
    pub payee_ref: String,
    /// Minor units (x100)
    pub amount: i64,
    /// Minor units (x100)
    pub fee: i64,
    pub reference: String,
    pub hash: String,
    pub signature: String,
}

impl HashChainTransaction {
    pub fn new(
        payer_ref: &str,
        payee_ref: &str,
        amount: i64,
        fee: i64,
        reference: &str,
        shared_secret: &str,
    ) -> Self {
        let hash = Self::compute_hash(payer_ref, payee_ref, amount, fee);
        let tag = hex::encode(Sha256::digest(format!("{}{}", hash, shared_secret)));
        let signature = format!("{}.{}", reference, tag);

        Self {
            payer_ref: payer_ref.to_string(),
            payee_ref: payee_ref.to_string(),
            amount,
            fee,
            reference: reference.to_string(),
            hash,
            signature,
        }
    }

    fn compute_hash(payer_ref: &str, payee_ref: &str, amount: i64, fee: i64) -> String {
        hex::encode(Sha256::digest(format!(
            "{}{}{}{}",
            payer_ref, payee_ref, amount, fee
        )))
    }
}

/// Extract the reference segment from a wire signature (prefix before '.')
pub fn reference_from_signature(signature: &str) -> Option<&str> {
    let (reference, _) = signature.split_once('.')?;
    if reference.is_empty() {
        None
    } else {
        Some(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_hash_is_deterministic_and_reference_free() {
        let a = HashChainTransaction::new("u-1", "m-2", 100_000, 0, "ref-a", "s3cret");
        let b = HashChainTransaction::new("u-1", "m-2", 100_000, 0, "ref-b", "s3cret");

        // Identical logical inputs -> identical hash, independent of reference
        assert_eq!(a.hash, b.hash);
        // Differing reference -> differing signature
        assert_ne!(a.signature, b.signature);
        assert!(a.signature.starts_with("ref-a."));
        assert!(b.signature.starts_with("ref-b."));
    }

    #[test]
    fn test_hash_changes_with_inputs() {
        let base = HashChainTransaction::new("u-1", "m-2", 100_000, 0, "r", "s");
        let other_amount = HashChainTransaction::new("u-1", "m-2", 100_001, 0, "r", "s");
        let other_payee = HashChainTransaction::new("u-1", "m-3", 100_000, 0, "r", "s");
        let other_fee = HashChainTransaction::new("u-1", "m-2", 100_000, 5, "r", "s");

        assert_ne!(base.hash, other_amount.hash);
        assert_ne!(base.hash, other_payee.hash);
        assert_ne!(base.hash, other_fee.hash);
    }

    #[test]
    fn test_system_wallets_canonicalize_each_position() {
        let system = SystemWallets::new(vec!["treasury-1".to_string()]);

        assert_eq!(system.canonical_ref("treasury-1"), ROOT_REF);
        assert_eq!(system.canonical_ref("u-7"), "u-7");

        let as_payer = HashChainTransaction::new(
            system.canonical_ref("treasury-1"),
            "u-7",
            500,
            0,
            "r1",
            "s",
        );
        let as_payee = HashChainTransaction::new(
            "u-7",
            system.canonical_ref("treasury-1"),
            500,
            0,
            "r2",
            "s",
        );

        assert_eq!(as_payer.payer_ref, ROOT_REF);
        assert_eq!(as_payee.payee_ref, ROOT_REF);
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(10.00)), Some(1000));
        assert_eq!(to_minor_units(dec!(0.01)), Some(1));
        assert_eq!(to_minor_units(dec!(12.345)), Some(1235));
        assert_eq!(to_minor_units(dec!(12.355)), Some(1236));
        assert_eq!(to_minor_units(dec!(0.005)), Some(1));
        assert_eq!(to_minor_units(dec!(-1)), None);
        assert_eq!(from_minor_units(1000), dec!(10.00));
        assert_eq!(from_minor_units(1), dec!(0.01));
    }

    #[test]
    fn test_reference_from_signature() {
        assert_eq!(reference_from_signature("u1.abcdef"), Some("u1"));
        assert_eq!(reference_from_signature(".abcdef"), None);
        assert_eq!(reference_from_signature("no-dot"), None);
    }
}
