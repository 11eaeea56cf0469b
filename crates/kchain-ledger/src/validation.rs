use kchain_crypto::VerifyingKey;

use crate::error::VerificationError;
use crate::transaction::Transaction;

/// Decide whether `candidate` may extend its asset's history.
///
/// `unspent` is the asset's current unspent transaction, or `None` if the
/// asset does not exist yet. Checks run in order:
/// 1. the claimed hash matches the content;
/// 2. with no unspent transaction, the candidate must be a creation signed
///    by `issuer`;
/// 3. otherwise the candidate must spend exactly `unspent` and be signed by
///    the key owning `unspent.output.address`.
///
/// This does not serialize competing spends; the engine's write lock does.
pub fn verify(
    candidate: &Transaction,
    unspent: Option<&Transaction>,
    issuer: &VerifyingKey,
) -> Result<(), VerificationError> {
    let computed = candidate.compute_hash();
    if candidate.hash.is_null() || candidate.hash != computed {
        return Err(VerificationError::MalformedTransaction {
            claimed: candidate.hash,
            computed,
        });
    }

    let digest = candidate.signing_digest();
    let asset_id = candidate.asset_id;

    match unspent {
        None => {
            let authorized = candidate.is_creation()
                && candidate.signer == *issuer
                && issuer.verify(digest.as_bytes(), &candidate.signature).is_ok();
            if !authorized {
                return Err(VerificationError::UnauthorizedCreation { asset_id });
            }
        }
        Some(prev) => {
            if candidate.asset_id != prev.asset_id || candidate.input != prev.hash {
                return Err(VerificationError::StaleReference {
                    asset_id,
                    expected: prev.hash,
                    found: candidate.input,
                });
            }
            let owned = candidate.signer.to_address() == prev.output.address
                && candidate
                    .signer
                    .verify(digest.as_bytes(), &candidate.signature)
                    .is_ok();
            if !owned {
                return Err(VerificationError::InvalidSignature { asset_id });
            }
        }
    }

    Ok(())
}
