/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::proto::BINDING_ID_SIZE;

/// Hex forms of the binding key and the binding id, as handed to the
/// external authority.
pub struct DerivedBinding {
    pub binding_key_hex: Zeroizing<String>,
    pub binding_id_hex: String,
}

/// Derive the binding id from raw exported keying material.
///
/// The id is the first half of a SHA-1 digest taken over the hex-encoded
/// binding key text, not over the raw bytes. The deployed external protocol
/// hashes the hex text; this must be preserved bit-for-bit.
pub fn derive(raw_binding_key: &[u8]) -> DerivedBinding {
    let binding_key_hex = Zeroizing::new(hex::encode(raw_binding_key));

    let mut sha1 = Sha1::new();
    sha1.update(binding_key_hex.as_bytes());
    let digest = sha1.finalize();

    DerivedBinding {
        binding_key_hex,
        binding_id_hex: hex::encode(&digest[..BINDING_ID_SIZE]),
    }
}

/// Binding key material of one handshake, derived exactly once and immutable
/// thereafter. The raw exporter output is wiped on session teardown.
pub struct BindingKeys {
    raw: Zeroizing<Vec<u8>>,
    id_hex: String,
}

impl BindingKeys {
    pub fn new(raw: Zeroizing<Vec<u8>>) -> Self {
        let id_hex = derive(&raw).binding_id_hex;
        Self { raw, id_hex }
    }

    /// Hex-encoded binding key. Secret; proves possession of the TLS session.
    pub fn key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&*self.raw))
    }

    /// Hex-encoded binding id, the non-secret lookup handle (20 characters).
    pub fn id_hex(&self) -> &str {
        &self.id_hex
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derive_is_deterministic_and_sized() {
        let raw = [7u8; 16];
        let a = derive(&raw);
        let b = derive(&raw);
        assert_eq!(*a.binding_key_hex, *b.binding_key_hex);
        assert_eq!(a.binding_id_hex, b.binding_id_hex);
        assert_eq!(a.binding_key_hex.len(), 32);
        assert_eq!(a.binding_id_hex.len(), 20);
    }

    #[test]
    fn derive_hashes_hex_text_not_raw_bytes() {
        // SHA-1("000102030405060708090a0b0c0d0e0f") =
        // 60ef1710d7cc28f856bde48ba1ceb087fa1c8442
        let raw: Vec<u8> = (0..16u8).collect();
        let d = derive(&raw);
        assert_eq!(*d.binding_key_hex, "000102030405060708090a0b0c0d0e0f");
        assert_eq!(d.binding_id_hex, "60ef1710d7cc28f856bd");

        let d = derive(&[0xffu8; 16]);
        assert_eq!(d.binding_id_hex, "1c7313922ea106d22dbe");
    }

    #[test]
    fn distinct_keys_yield_distinct_ids() {
        let a = derive(&[1u8; 16]);
        let b = derive(&[2u8; 16]);
        assert_ne!(a.binding_id_hex, b.binding_id_hex);
    }

    #[test]
    fn binding_keys_expose_hex_forms() {
        let keys = BindingKeys::new(Zeroizing::new(vec![0u8; 16]));
        assert_eq!(keys.key_hex().len(), 32);
        assert_eq!(keys.id_hex().len(), 20);
        assert_eq!(keys.id_hex(), derive(&[0u8; 16]).binding_id_hex);
    }
}
