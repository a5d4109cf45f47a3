//! Structural validation for transactions.
//!
//! These checks need no wallet state. State-dependent rules belong to the
//! transaction handlers.

use num_traits::{Signed, Zero};

use crate::error::ValidationError;
use crate::transaction::{Transaction, TRANSACTION_VERSION};
use crate::types::TransactionKey;

/// Validate a transaction's structure without checking the signature.
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), ValidationError> {
    // 1. Version
    if tx.data.version != TRANSACTION_VERSION {
        return Err(ValidationError::UnsupportedVersion(tx.data.version));
    }

    // 2. Asset must belong to the declared type
    if !tx.data.asset.fits(tx.data.key) {
        return Err(ValidationError::AssetMismatch(tx.data.key));
    }

    // 3. No negative quantities
    if tx.data.fee.is_negative() {
        return Err(ValidationError::StructuralError("negative fee".into()));
    }
    if tx.data.amount.is_negative() {
        return Err(ValidationError::StructuralError("negative amount".into()));
    }

    // 4. Value-moving types name a recipient
    let needs_recipient = matches!(
        tx.data.key,
        TransactionKey::TRANSFER | TransactionKey::HTLC_LOCK
    );
    if needs_recipient && tx.data.recipient.is_none() {
        return Err(ValidationError::MissingRecipient);
    }

    // 5. Only value-moving types carry an amount
    if !needs_recipient && !tx.data.amount.is_zero() {
        return Err(ValidationError::StructuralError(format!(
            "type {} must not carry an amount",
            tx.data.key
        )));
    }

    // 6. Id must be the content address
    if tx.id != tx.compute_id() {
        return Err(ValidationError::IdMismatch);
    }

    Ok(())
}

/// Full validation: structure plus signature.
pub fn validate_transaction(tx: &Transaction) -> Result<(), ValidationError> {
    validate_transaction_structure(tx)?;
    tx.verify_signature()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Keypair, Signature};
    use crate::transaction::{Asset, TransactionBuilder};
    use crate::types::Address;
    use num_bigint::BigInt;

    fn keypair() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    #[test]
    fn test_valid_transaction() {
        let tx = TransactionBuilder::transfer(Address::from_bytes([1; 20]), 10)
            .fee(1)
            .sign(&keypair());
        assert!(validate_transaction(&tx).is_ok());
    }

    #[test]
    fn test_bad_signature() {
        let mut tx = TransactionBuilder::stake_redeem(5).sign(&keypair());
        tx.signature = Signature::ZERO;
        tx.id = tx.compute_id();
        assert!(matches!(
            validate_transaction(&tx),
            Err(ValidationError::SignatureFailed)
        ));
    }

    #[test]
    fn test_id_mismatch() {
        let mut tx = TransactionBuilder::stake_redeem(5).sign(&keypair());
        tx.id.0[0] ^= 0xff;
        assert!(matches!(
            validate_transaction_structure(&tx),
            Err(ValidationError::IdMismatch)
        ));
    }

    #[test]
    fn test_asset_mismatch() {
        let tx = TransactionBuilder::new(TransactionKey::STAKE_CREATE, Asset::None).sign(&keypair());
        assert!(matches!(
            validate_transaction_structure(&tx),
            Err(ValidationError::AssetMismatch(_))
        ));
    }

    #[test]
    fn test_amount_only_on_value_types() {
        let tx = TransactionBuilder::stake_redeem(1).amount(5).sign(&keypair());
        assert!(matches!(
            validate_transaction_structure(&tx),
            Err(ValidationError::StructuralError(_))
        ));
    }

    #[test]
    fn test_missing_recipient_and_negative_fee() {
        let tx = TransactionBuilder::new(TransactionKey::TRANSFER, Asset::None).sign(&keypair());
        assert!(matches!(
            validate_transaction_structure(&tx),
            Err(ValidationError::MissingRecipient)
        ));

        let tx = TransactionBuilder::stake_redeem(1)
            .fee(BigInt::from(-1))
            .sign(&keypair());
        assert!(matches!(
            validate_transaction_structure(&tx),
            Err(ValidationError::StructuralError(_))
        ));
    }
}
