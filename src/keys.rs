//! Passphrase → key material derivation
//!
//! A pure, deterministic transform: SHA256(passphrase) is the private-key
//! scalar, the address comes from the uncompressed public key (the form
//! historical brain-wallet generators used), and the WIF carries no
//! compression flag so imports land on the same address.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use serde::Serialize;

use crate::address;
use crate::crypto;
use crate::error::{HuntError, Result};

/// Everything derived from one passphrase
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DerivedKey {
    pub private_key_hex: String,
    pub private_key_wif: String,
    pub address: String,
}

/// Derive key material from a passphrase.
///
/// Total over non-empty text: the only error paths are the empty string
/// (rejected by policy, not silently hashed) and the ~2^-128 case of a
/// digest outside the valid scalar range.
pub fn derive(passphrase: &str) -> Result<DerivedKey> {
    if passphrase.is_empty() {
        return Err(HuntError::InvalidPassphrase("empty passphrase".into()));
    }

    let key = crypto::passphrase_key(passphrase);
    if !crypto::is_valid_private_key(&key) {
        return Err(HuntError::InvalidPassphrase(
            "digest outside secp256k1 scalar range".into(),
        ));
    }

    let secret = SecretKey::from_slice(&key)
        .map_err(|_| HuntError::InvalidPassphrase("rejected by secp256k1".into()))?;
    let pubkey = secret.public_key();
    let point = pubkey.to_encoded_point(false);

    Ok(DerivedKey {
        private_key_hex: hex::encode(key),
        private_key_wif: address::to_wif(&key, false),
        address: address::p2pkh_address(point.as_bytes()),
    })
}
