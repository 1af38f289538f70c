//! # Crypto Helpers
//!
//! Hashing under the chain hash type, credential decoding, signature
//! verification, node ids and account address derivation.

use crate::domain::errors::{AccessControlError, AccessControlResult};
use openssl::bn::BigNumContext;
use openssl::ec::PointConversionForm;
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::sign::Verifier;
use openssl::x509::X509;
use sha2::{Digest, Sha256};
use sha3::{Keccak256, Sha3_256};
use shared_types::{AddrType, HashType};

const PEM_PREFIX: &[u8] = b"-----BEGIN";

fn crypto_err(context: &str) -> impl Fn(openssl::error::ErrorStack) -> AccessControlError + '_ {
    move |e| AccessControlError::Crypto(format!("{context}: {e}"))
}

/// Hash `data` under the chain hash type.
pub fn hash(hash_type: HashType, data: &[u8]) -> AccessControlResult<Vec<u8>> {
    match hash_type {
        HashType::Sha256 => Ok(Sha256::digest(data).to_vec()),
        HashType::Sha3_256 => Ok(Sha3_256::digest(data).to_vec()),
        HashType::Sm3 => openssl::hash::hash(MessageDigest::sm3(), data)
            .map(|digest| digest.to_vec())
            .map_err(crypto_err("sm3")),
    }
}

/// Keccak-256 (pre-standard SHA-3 padding), used for Ethereum addresses.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// Digest used when verifying signatures under the chain hash type.
#[must_use]
pub fn message_digest(hash_type: HashType) -> MessageDigest {
    match hash_type {
        HashType::Sha256 => MessageDigest::sha256(),
        HashType::Sha3_256 => MessageDigest::sha3_256(),
        HashType::Sm3 => MessageDigest::sm3(),
    }
}

/// Certificate id: hex of the chain hash of the DER encoding.
pub fn cert_id(hash_type: HashType, der: &[u8]) -> AccessControlResult<String> {
    hash(hash_type, der).map(hex::encode)
}

/// Decode a certificate from PEM or DER.
pub fn parse_certificate(bytes: &[u8]) -> AccessControlResult<X509> {
    let parsed = if bytes.trim_ascii_start().starts_with(PEM_PREFIX) {
        X509::from_pem(bytes)
    } else {
        X509::from_der(bytes)
    };
    parsed.map_err(|e| AccessControlError::MalformedCredential(format!("certificate: {e}")))
}

/// Decode every certificate in a PEM bundle.
pub fn parse_certificate_bundle(pem: &[u8]) -> AccessControlResult<Vec<X509>> {
    let certs = X509::stack_from_pem(pem)
        .map_err(|e| AccessControlError::MalformedCredential(format!("certificate: {e}")))?;
    if certs.is_empty() {
        return Err(AccessControlError::MalformedCredential(
            "no certificate in PEM block".to_string(),
        ));
    }
    Ok(certs)
}

/// Decode a public key from PEM or DER.
pub fn parse_public_key(bytes: &[u8]) -> AccessControlResult<PKey<Public>> {
    let parsed = if bytes.trim_ascii_start().starts_with(PEM_PREFIX) {
        PKey::public_key_from_pem(bytes)
    } else {
        PKey::public_key_from_der(bytes)
    };
    parsed.map_err(|e| AccessControlError::MalformedCredential(format!("public key: {e}")))
}

/// DER (SubjectPublicKeyInfo) encoding of a public key.
pub fn public_key_der(key: &PKeyRef<Public>) -> AccessControlResult<Vec<u8>> {
    key.public_key_to_der().map_err(crypto_err("public key der"))
}

/// Canonical PEM encoding of a public key.
pub fn public_key_pem(key: &PKeyRef<Public>) -> AccessControlResult<Vec<u8>> {
    key.public_key_to_pem().map_err(crypto_err("public key pem"))
}

/// Verify `signature` over `message`.
///
/// Ed25519 keys sign the raw message; every other key type signs the
/// digest selected by the chain hash type. A signature the library cannot
/// even decode counts as a mismatch, not as an internal error.
pub fn verify_signature(
    key: &PKeyRef<Public>,
    hash_type: HashType,
    message: &[u8],
    signature: &[u8],
) -> AccessControlResult<bool> {
    if key.id() == Id::ED25519 {
        let mut verifier = Verifier::new_without_digest(key).map_err(crypto_err("verifier"))?;
        return Ok(verifier.verify_oneshot(signature, message).unwrap_or(false));
    }

    let mut verifier =
        Verifier::new(message_digest(hash_type), key).map_err(crypto_err("verifier"))?;
    verifier.update(message).map_err(crypto_err("verifier"))?;
    Ok(verifier.verify(signature).unwrap_or(false))
}

/// Node id of a raw public key: hex SHA-256 of its DER encoding.
pub fn node_id(key: &PKeyRef<Public>) -> AccessControlResult<String> {
    Ok(hex::encode(Sha256::digest(public_key_der(key)?)))
}

/// Derive the account address of a public key.
///
/// - `CHAINMAKER`: hex of the last 20 bytes of SHA-256 over the key DER.
/// - `ZXL`: `ZX` followed by hex of the first 20 bytes of SM3 over the key DER.
/// - `ETHEREUM`: `0x` followed by hex of the last 20 bytes of Keccak-256
///   over the uncompressed EC point without its `0x04` prefix.
pub fn address(addr_type: AddrType, key: &PKeyRef<Public>) -> AccessControlResult<String> {
    match addr_type {
        AddrType::Chainmaker => {
            let digest = Sha256::digest(public_key_der(key)?);
            Ok(hex::encode(&digest[12..]))
        }
        AddrType::Zxl => {
            let digest = hash(HashType::Sm3, &public_key_der(key)?)?;
            Ok(format!("ZX{}", hex::encode(&digest[..20])))
        }
        AddrType::Ethereum => {
            let ec = key.ec_key().map_err(|_| {
                AccessControlError::MalformedCredential(
                    "ethereum addresses require an EC key".to_string(),
                )
            })?;
            let mut ctx = BigNumContext::new().map_err(crypto_err("bn ctx"))?;
            let point = ec
                .public_key()
                .to_bytes(ec.group(), PointConversionForm::UNCOMPRESSED, &mut ctx)
                .map_err(crypto_err("ec point"))?;
            let digest = keccak256(&point[1..]);
            Ok(format!("0x{}", hex::encode(&digest[12..])))
        }
    }
}
