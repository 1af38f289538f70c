//! # CRL Decoding
//!
//! `openssl` parses and verifies CRLs but does not expose the CRL extensions
//! we key on, so the authority key identifier and the CRL number are read
//! from the DER `TBSCertList` directly.
//!
//! ```text
//! CertificateList ::= SEQUENCE {
//!     tbsCertList     SEQUENCE {
//!         version         INTEGER OPTIONAL,
//!         signature       AlgorithmIdentifier,
//!         issuer          Name,
//!         thisUpdate      Time,
//!         nextUpdate      Time OPTIONAL,
//!         revokedCerts    SEQUENCE OF ... OPTIONAL,
//!         crlExtensions   [0] EXPLICIT Extensions OPTIONAL },
//!     signatureAlgorithm  AlgorithmIdentifier,
//!     signatureValue      BIT STRING }
//! ```

use crate::domain::errors::{AccessControlError, AccessControlResult};
use openssl::x509::X509Crl;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_CRL_EXTENSIONS: u8 = 0xa0;
const TAG_KEY_IDENTIFIER: u8 = 0x80;

/// 2.5.29.35
const OID_AUTHORITY_KEY_ID: &[u8] = &[0x55, 0x1d, 0x23];
/// 2.5.29.20
const OID_CRL_NUMBER: &[u8] = &[0x55, 0x1d, 0x14];

const PEM_BEGIN: &str = "-----BEGIN X509 CRL-----";

/// Fields of a CRL that `openssl` does not surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrlMetadata {
    /// `TBSCertList.version` (0 for v1, 1 for v2).
    pub tbs_version: u64,
    /// CRL number extension.
    pub crl_number: Option<u64>,
    /// Key identifier of the authority key identifier extension.
    pub authority_key_id: Option<Vec<u8>>,
}

impl CrlMetadata {
    /// Ordering key between successive CRLs of one authority: the CRL
    /// number when present, the structure version otherwise.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.crl_number.unwrap_or(self.tbs_version)
    }
}

/// Split a PEM bundle into its CRLs.
pub fn parse_crl_bundle(pem: &[u8]) -> AccessControlResult<Vec<X509Crl>> {
    let text = std::str::from_utf8(pem)
        .map_err(|_| AccessControlError::MalformedCredential("CRL is not PEM text".to_string()))?;

    let crls = text
        .match_indices(PEM_BEGIN)
        .map(|(start, _)| {
            X509Crl::from_pem(text[start..].as_bytes())
                .map_err(|e| AccessControlError::MalformedCredential(format!("CRL: {e}")))
        })
        .collect::<AccessControlResult<Vec<_>>>()?;

    if crls.is_empty() {
        return Err(AccessControlError::MalformedCredential(
            "no CRL in PEM block".to_string(),
        ));
    }
    Ok(crls)
}

/// Read the CRL metadata from a DER `CertificateList`.
pub fn crl_metadata(der: &[u8]) -> AccessControlResult<CrlMetadata> {
    let (list, _) = expect_tlv(der, TAG_SEQUENCE)?;
    let (tbs, _) = expect_tlv(list, TAG_SEQUENCE)?;

    let mut meta = CrlMetadata::default();
    let mut rest = tbs;
    while !rest.is_empty() {
        let (tag, content, next) = read_tlv(rest)?;
        match tag {
            TAG_INTEGER if rest.len() == tbs.len() => meta.tbs_version = read_uint(content)?,
            TAG_CRL_EXTENSIONS => read_extensions(content, &mut meta)?,
            _ => {}
        }
        rest = next;
    }
    Ok(meta)
}

fn read_extensions(wrapped: &[u8], meta: &mut CrlMetadata) -> AccessControlResult<()> {
    let (mut extensions, _) = expect_tlv(wrapped, TAG_SEQUENCE)?;
    while !extensions.is_empty() {
        let (extension, next) = expect_tlv(extensions, TAG_SEQUENCE)?;
        let (oid, mut fields) = expect_tlv(extension, TAG_OID)?;

        // Skip the optional `critical` flag.
        let mut value = None;
        while !fields.is_empty() {
            let (tag, content, after) = read_tlv(fields)?;
            if tag == TAG_OCTET_STRING {
                value = Some(content);
            }
            fields = after;
        }

        if let Some(value) = value {
            if oid == OID_CRL_NUMBER {
                let (number, _) = expect_tlv(value, TAG_INTEGER)?;
                meta.crl_number = Some(read_uint(number)?);
            } else if oid == OID_AUTHORITY_KEY_ID {
                let (aki, _) = expect_tlv(value, TAG_SEQUENCE)?;
                let mut parts = aki;
                while !parts.is_empty() {
                    let (tag, content, after) = read_tlv(parts)?;
                    if tag == TAG_KEY_IDENTIFIER {
                        meta.authority_key_id = Some(content.to_vec());
                    }
                    parts = after;
                }
            }
        }
        extensions = next;
    }
    Ok(())
}

fn malformed(what: &str) -> AccessControlError {
    AccessControlError::MalformedCredential(format!("CRL DER: {what}"))
}

/// Read one TLV, returning `(tag, content, remainder)`.
fn read_tlv(input: &[u8]) -> AccessControlResult<(u8, &[u8], &[u8])> {
    let (&tag, rest) = input.split_first().ok_or_else(|| malformed("truncated tag"))?;
    let (&first, rest) = rest.split_first().ok_or_else(|| malformed("truncated length"))?;

    let (len, rest) = if first & 0x80 == 0 {
        (usize::from(first), rest)
    } else {
        let octets = usize::from(first & 0x7f);
        if octets == 0 || octets > 4 || rest.len() < octets {
            return Err(malformed("unsupported length"));
        }
        let len = rest[..octets]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
        (len, &rest[octets..])
    };

    if rest.len() < len {
        return Err(malformed("truncated content"));
    }
    Ok((tag, &rest[..len], &rest[len..]))
}

fn expect_tlv(input: &[u8], expected: u8) -> AccessControlResult<(&[u8], &[u8])> {
    let (tag, content, rest) = read_tlv(input)?;
    if tag != expected {
        return Err(malformed("unexpected tag"));
    }
    Ok((content, rest))
}

fn read_uint(content: &[u8]) -> AccessControlResult<u64> {
    let trimmed: &[u8] = match content {
        [0, rest @ ..] => rest,
        other => other,
    };
    if trimmed.len() > 8 {
        return Err(malformed("integer too large"));
    }
    Ok(trimmed.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}
