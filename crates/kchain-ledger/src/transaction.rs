use std::fmt;

use kchain_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use kchain_types::{serde_hex, Address, AssetId, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// Result of a transaction: the new owner and an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: Address,
    #[serde(with = "serde_hex")]
    pub payload: Vec<u8>,
}

impl Output {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(address: Address, payload: Vec<u8>) -> Self {
        Self { address, payload }
    }
}

/// A signed state change: the creation or transfer of one asset.
///
/// `hash` covers every field except `seq`, which the chain log assigns on
/// append. `input` is the hash of the asset's unspent transaction, or the
/// null hash for a creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub seq: u64,
    pub hash: TxHash,
    pub asset_id: AssetId,
    pub input: TxHash,
    pub output: Output,
    pub signer: VerifyingKey,
    pub signature: Signature,
}

impl Transaction {
    /// Build a creation transaction signed by the issuer.
    pub fn creation(asset_id: AssetId, output: Output, issuer: &SigningKey) -> Self {
        Self::signed(asset_id, TxHash::null(), output, issuer)
    }

    /// Build a transfer spending `prev`, signed by its current owner.
    pub fn transfer(prev: &Transaction, output: Output, owner: &SigningKey) -> Self {
        Self::signed(prev.asset_id, prev.hash, output, owner)
    }

    /// Build and sign a transaction from its parts.
    pub fn signed(asset_id: AssetId, input: TxHash, output: Output, key: &SigningKey) -> Self {
        let signer = key.verifying_key();
        let digest = ContentHasher::SIGNING.hash(&signed_content(asset_id, &input, &output, &signer));
        let mut tx = Self {
            seq: 0,
            hash: TxHash::null(),
            asset_id,
            input,
            output,
            signer,
            signature: key.sign(digest.as_bytes()),
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Returns `true` if this transaction creates its asset.
    pub fn is_creation(&self) -> bool {
        self.input.is_null()
    }

    /// The digest the signature covers.
    pub fn signing_digest(&self) -> TxHash {
        ContentHasher::SIGNING.hash(&signed_content(
            self.asset_id,
            &self.input,
            &self.output,
            &self.signer,
        ))
    }

    /// Recompute the content hash from the transaction's fields.
    pub fn compute_hash(&self) -> TxHash {
        let mut content = signed_content(self.asset_id, &self.input, &self.output, &self.signer);
        content.extend_from_slice(&self.signature.to_bytes());
        ContentHasher::TX.hash(&content)
    }

    /// Copy of this transaction at the given log position.
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Binary (bincode) encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        bincode::serialize(self).map_err(|e| EncodingError::Binary(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        bincode::deserialize(bytes).map_err(|e| EncodingError::Binary(e.to_string()))
    }

    /// Hex encoding of the binary form.
    pub fn to_hex(&self) -> Result<String, EncodingError> {
        self.to_bytes().map(hex::encode)
    }

    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let bytes = hex::decode(s.trim()).map_err(|e| EncodingError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx#{} {} asset={} in={} out={}",
            self.seq,
            self.hash.short_hex(),
            self.asset_id,
            self.input.short_hex(),
            self.output.address.short_id()
        )
    }
}

/// Canonical bytes of the signed fields.
fn signed_content(
    asset_id: AssetId,
    input: &TxHash,
    output: &Output,
    signer: &VerifyingKey,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 32 + 32 + 8 + output.payload.len() + 32);
    buf.extend_from_slice(&asset_id.to_le_bytes());
    buf.extend_from_slice(input.as_bytes());
    buf.extend_from_slice(output.address.as_bytes());
    buf.extend_from_slice(&(output.payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&output.payload);
    buf.extend_from_slice(&signer.as_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn issuer() -> SigningKey {
        SigningKey::from_bytes([7; 32])
    }

    fn owner() -> SigningKey {
        SigningKey::from_bytes([8; 32])
    }

    #[test]
    fn creation_has_null_input_and_valid_hash() {
        let tx = Transaction::creation(AssetId::new(1), Output::new(owner().address()), &issuer());
        assert!(tx.is_creation());
        assert!(!tx.hash.is_null());
        assert_eq!(tx.hash, tx.compute_hash());
        assert!(tx
            .signer
            .verify(tx.signing_digest().as_bytes(), &tx.signature)
            .is_ok());
    }

    #[test]
    fn transfer_references_previous_hash() {
        let create = Transaction::creation(AssetId::new(2), Output::new(owner().address()), &issuer());
        let next = Transaction::transfer(&create, Output::new(issuer().address()), &owner());
        assert!(!next.is_creation());
        assert_eq!(next.input, create.hash);
        assert_eq!(next.asset_id, create.asset_id);
    }

    #[test]
    fn sequence_is_not_hashed() {
        let tx = Transaction::creation(AssetId::new(3), Output::new(owner().address()), &issuer());
        let moved = tx.clone().with_seq(42);
        assert_eq!(moved.seq, 42);
        assert_eq!(moved.compute_hash(), tx.hash);
    }

    #[test]
    fn binary_and_hex_encodings_decode_to_same_tx() {
        let tx = Transaction::creation(
            AssetId::new(4),
            Output::with_payload(owner().address(), b"genes".to_vec()),
            &issuer(),
        );
        assert_eq!(Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap(), tx);
        assert_eq!(Transaction::from_hex(&tx.to_hex().unwrap()).unwrap(), tx);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(Transaction::from_hex("xyz"), Err(EncodingError::Hex(_))));
        assert!(matches!(Transaction::from_hex("00ff"), Err(EncodingError::Binary(_))));
    }

    #[test]
    fn json_form_uses_hex_fields() {
        let tx = Transaction::creation(AssetId::new(5), Output::new(owner().address()), &issuer());
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["hash"], serde_json::Value::from(tx.hash.to_hex()));
        assert_eq!(json["asset_id"], serde_json::Value::from(5));
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn display_is_compact() {
        let tx = Transaction::creation(AssetId::new(6), Output::new(owner().address()), &issuer());
        let shown = tx.to_string();
        assert!(shown.starts_with("tx#0 "));
        assert!(shown.contains("asset=6"));
    }

    proptest! {
        #[test]
        fn any_field_change_changes_hash(
            asset in any::<u64>(),
            other_asset in any::<u64>(),
            payload in proptest::collection::vec(any::<u8>(), 0..32),
            flip in any::<u8>(),
        ) {
            prop_assume!(asset != other_asset);
            let tx = Transaction::creation(
                AssetId::new(asset),
                Output::with_payload(owner().address(), payload.clone()),
                &issuer(),
            );

            let mut changed_asset = tx.clone();
            changed_asset.asset_id = AssetId::new(other_asset);
            prop_assert_ne!(changed_asset.compute_hash(), tx.hash);

            let mut changed_payload = tx.clone();
            changed_payload.output.payload.push(flip);
            prop_assert_ne!(changed_payload.compute_hash(), tx.hash);

            let mut changed_owner = tx.clone();
            changed_owner.output.address = issuer().address();
            prop_assert_ne!(changed_owner.compute_hash(), tx.hash);

            let mut changed_input = tx.clone();
            changed_input.input = TxHash::from_hash([flip | 1; 32]);
            prop_assert_ne!(changed_input.compute_hash(), tx.hash);

            let mut changed_sig = tx.clone();
            let mut sig = tx.signature.to_bytes();
            sig[0] ^= flip | 1;
            changed_sig.signature = Signature::from_bytes(sig);
            prop_assert_ne!(changed_sig.compute_hash(), tx.hash);
        }
    }
}
