//! Fuzz target for credential decoding.
//!
//! Every endorsement on the wire carries attacker-controlled certificate,
//! key and CRL bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use qc_10_access_control::domain::{crl, crypto};
use shared_types::HashType;

#[derive(Debug, arbitrary::Arbitrary)]
struct DecodeInput {
    credential: Vec<u8>,
    message: Vec<u8>,
    signature: Vec<u8>,
}

fuzz_target!(|input: DecodeInput| {
    if let Ok(cert) = crypto::parse_certificate(&input.credential) {
        if let Ok(key) = cert.public_key() {
            let _ = crypto::verify_signature(&key, HashType::Sha256, &input.message, &input.signature);
        }
    }

    if let Ok(key) = crypto::parse_public_key(&input.credential) {
        // A key that decodes always has a node id.
        assert!(crypto::node_id(&key).is_ok());
        let _ = crypto::verify_signature(&key, HashType::Sha3_256, &input.message, &input.signature);
    }

    let _ = crypto::parse_certificate_bundle(&input.credential);
    let _ = crl::parse_crl_bundle(&input.credential);
    let _ = crl::crl_metadata(&input.credential);
});
