use sha2::{Digest, Sha256};

use crate::crypto::hash160;

const P2PKH_VERSION: u8 = 0x00;
const WIF_VERSION: u8 = 0x80;

/// Base58Check with a single version byte prefix
fn base58check(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + 5);
    data.push(version);
    data.extend_from_slice(payload);

    let checksum = Sha256::digest(&Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);

    bs58::encode(data).into_string()
}

/// Mainnet P2PKH address from SEC1 public key bytes
/// (compressed or uncompressed, the hash160 decides the address)
pub fn p2pkh_address(pubkey_bytes: &[u8]) -> String {
    base58check(P2PKH_VERSION, &hash160(pubkey_bytes))
}

/// Private key to WIF
/// The 0x01 suffix marks a compressed pubkey; omit it for keys whose
/// address was derived from the uncompressed form, or the import
/// resolves to a different address and the coins look gone.
pub fn to_wif(key: &[u8; 32], compressed: bool) -> String {
    let mut payload = Vec::with_capacity(33);
    payload.extend_from_slice(key);
    if compressed {
        payload.push(0x01);
    }
    base58check(WIF_VERSION, &payload)
}
