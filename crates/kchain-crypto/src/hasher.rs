use kchain_types::TxHash;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so the digest a signer commits to can never be confused with
/// a transaction identity over the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for transaction identities.
    pub const TX: Self = Self {
        domain: "kchain-tx-v1",
    };
    /// Hasher for the digest a transaction signature covers.
    pub const SIGNING: Self = Self {
        domain: "kchain-sign-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> TxHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        TxHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &TxHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = ContentHasher::TX.hash(b"kitty");
        let b = ContentHasher::TX.hash(b"kitty");
        assert_eq!(a, b);
        assert!(!a.is_null());
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        assert_ne!(
            ContentHasher::TX.hash(b"same"),
            ContentHasher::SIGNING.hash(b"same")
        );
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::TX.hash(b"original");
        assert!(ContentHasher::TX.verify(b"original", &id));
        assert!(!ContentHasher::TX.verify(b"tampered", &id));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("test-domain-v1");
        assert_eq!(hasher.domain(), "test-domain-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::TX.hash(b"data"));
    }
}
