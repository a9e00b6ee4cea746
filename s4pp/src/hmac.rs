//! Streaming HMAC-SHA256, restartable per sequence.
//!
//! The `hmac` crate's one-shot API doesn't fit here: a sequence's HMAC is
//! seeded with a fresh token and then fed every outgoing byte as it's
//! appended to the send buffer, not all at once at the end. So this hand-
//! builds the classic inner/outer pad construction directly on `sha2`,
//! keeping a running inner digest that can be reseeded.

use sha2::{Digest, Sha256};

const BLOCK_LEN: usize = 64;

/// A reseedable HMAC-SHA256 context.
pub struct StreamingHmac {
    opad: [u8; BLOCK_LEN],
    ipad: [u8; BLOCK_LEN],
    inner: Sha256,
}

impl StreamingHmac {
    /// Derive `K'` from `key` (hashing it down if longer than a block) and
    /// start a fresh inner context. Call [`StreamingHmac::restart`] before
    /// each sequence to seed it with that sequence's token.
    pub fn new(key: &[u8]) -> Self {
        let mut key_block = [0u8; BLOCK_LEN];
        if key.len() > BLOCK_LEN {
            let digest = Sha256::digest(key);
            key_block[..digest.len()].copy_from_slice(&digest);
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut ipad = [0u8; BLOCK_LEN];
        let mut opad = [0u8; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            ipad[i] = key_block[i] ^ 0x36;
            opad[i] = key_block[i] ^ 0x5C;
        }

        let mut inner = Sha256::new();
        inner.update(ipad);
        Self { opad, ipad, inner }
    }

    /// Reset the running digest to just after the inner pad, then feed
    /// `token` — the per-sequence re-seed in place of a nonce.
    pub fn restart(&mut self, token: &[u8]) {
        let mut inner = Sha256::new();
        inner.update(self.ipad);
        inner.update(token);
        self.inner = inner;
    }

    /// Feed more bytes of the outgoing sequence into the running digest.
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Finalize: `SHA256(opad || SHA256(inner_state))`. Does not consume
    /// `self` — a caller that needs to keep streaming past a checkpoint
    /// read can call this without losing state, though in practice a
    /// sequence's SIG line is always its last byte.
    pub fn finalize(&self) -> [u8; 32] {
        let inner_digest = self.inner.clone().finalize();
        let mut outer = Sha256::new();
        outer.update(self.opad);
        outer.update(inner_digest);
        outer.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex;

    // RFC 4231 test case 1: Key = 0x0b * 20, Data = "Hi There".
    #[test]
    fn matches_rfc4231_case_1() {
        let key = [0x0bu8; 20];
        let mut hmac = StreamingHmac::new(&key);
        hmac.restart(&[]);
        hmac.update(b"Hi There");
        let digest = hmac.finalize();
        let mut buf = [0u8; 64];
        assert_eq!(
            hex::encode(&digest, &mut buf),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff"
        );
    }

    #[test]
    fn restart_reseeds_independent_of_prior_sequence() {
        let key = b"shared-secret";
        let mut hmac = StreamingHmac::new(key);
        hmac.restart(b"token-a");
        hmac.update(b"sequence one body");
        let first = hmac.finalize();

        hmac.restart(b"token-a");
        hmac.update(b"sequence one body");
        let replayed = hmac.finalize();
        assert_eq!(first, replayed);

        hmac.restart(b"token-b");
        hmac.update(b"sequence one body");
        let different_token = hmac.finalize();
        assert_ne!(first, different_token);
    }

    #[test]
    fn key_longer_than_block_is_hashed_down() {
        let long_key = [0x42u8; 100];
        let mut a = StreamingHmac::new(&long_key);
        a.restart(b"t");
        a.update(b"m");

        let digest_of_key = Sha256::digest(long_key);
        let mut b = StreamingHmac::new(&digest_of_key);
        b.restart(b"t");
        b.update(b"m");

        assert_eq!(a.finalize(), b.finalize());
    }
}
