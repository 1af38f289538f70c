//! # Resolved Members
//!
//! A wire `Member` after the provider decoded its credential and assigned it
//! an organization and a role. Resolved members are immutable and shared
//! behind `Arc` between the member cache and concurrent verifiers.

use crate::domain::crypto;
use crate::domain::entities::Role;
use crate::domain::errors::{AccessControlError, AccessControlResult};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Public};
use openssl::x509::{X509Ref, X509};
use shared_types::{AddrType, HashType, Member, MemberType};
use std::fmt;

/// Credential backing a resolved member.
#[derive(Clone)]
pub enum Credential {
    /// X.509 certificate, with the validated path up to its root (empty for
    /// pinned trust members).
    Certificate { cert: X509, chain: Vec<X509> },
    /// Raw public key.
    PublicKey,
}

/// Cache key of a wire member.
///
/// Certificate hashes are raw bytes and are hex encoded; every other kind
/// carries text.
#[must_use]
pub fn member_cache_key(member: &Member) -> String {
    let info = match member.member_type {
        MemberType::CertHash => hex::encode(&member.member_info),
        _ => String::from_utf8_lossy(&member.member_info).into_owned(),
    };
    format!("{}/{}", member.member_type.as_str(), info)
}

/// A member whose credential has been decoded and classified.
#[derive(Clone)]
pub struct ResolvedMember {
    org_id: String,
    member_id: String,
    uid: String,
    role: Role,
    public_key: PKey<Public>,
    credential: Credential,
    hash_type: HashType,
    wire: Member,
}

impl ResolvedMember {
    /// Member backed by a certificate.
    ///
    /// The member id is the subject CN; the uid is the hex subject key
    /// identifier, or the certificate id when the extension is absent.
    pub fn from_certificate(
        wire: Member,
        org_id: impl Into<String>,
        role: Role,
        cert: X509,
        chain: Vec<X509>,
        hash_type: HashType,
    ) -> AccessControlResult<Self> {
        let public_key = cert
            .public_key()
            .map_err(|e| AccessControlError::MalformedCredential(format!("certificate key: {e}")))?;
        let uid = match cert.subject_key_id() {
            Some(ski) => hex::encode(ski.as_slice()),
            None => {
                let der = cert
                    .to_der()
                    .map_err(|e| AccessControlError::Crypto(format!("certificate der: {e}")))?;
                crypto::cert_id(hash_type, &der)?
            }
        };
        Ok(Self {
            org_id: org_id.into(),
            member_id: common_name(&cert).unwrap_or_else(|| uid.clone()),
            uid,
            role,
            public_key,
            credential: Credential::Certificate { cert, chain },
            hash_type,
            wire,
        })
    }

    /// Member backed by a raw public key. Member id and uid are the node id.
    pub fn from_public_key(
        wire: Member,
        org_id: impl Into<String>,
        role: Role,
        public_key: PKey<Public>,
        hash_type: HashType,
    ) -> AccessControlResult<Self> {
        let node_id = crypto::node_id(&public_key)?;
        Ok(Self {
            org_id: org_id.into(),
            member_id: node_id.clone(),
            uid: node_id,
            role,
            public_key,
            credential: Credential::PublicKey,
            hash_type,
            wire,
        })
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn public_key(&self) -> &PKey<Public> {
        &self.public_key
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// The certificate, for certificate-backed members.
    pub fn certificate(&self) -> Option<&X509> {
        match &self.credential {
            Credential::Certificate { cert, .. } => Some(cert),
            Credential::PublicKey => None,
        }
    }

    /// The wire member this was resolved from.
    pub fn member(&self) -> &Member {
        &self.wire
    }

    /// Canonical PEM of the member's public key.
    pub fn public_key_pem(&self) -> AccessControlResult<Vec<u8>> {
        crypto::public_key_pem(&self.public_key)
    }

    /// Account address under the given address type.
    pub fn address(&self, addr_type: AddrType) -> AccessControlResult<String> {
        crypto::address(addr_type, &self.public_key)
    }

    /// Verify a signature made by this member.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> AccessControlResult<()> {
        if crypto::verify_signature(&self.public_key, self.hash_type, message, signature)? {
            Ok(())
        } else {
            Err(AccessControlError::InvalidSignature(self.member_id.clone()))
        }
    }
}

impl fmt::Debug for ResolvedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedMember")
            .field("org_id", &self.org_id)
            .field("member_id", &self.member_id)
            .field("role", &self.role)
            .field("member_type", &self.wire.member_type)
            .finish_non_exhaustive()
    }
}

/// First subject CN of a certificate.
pub fn common_name(cert: &X509Ref) -> Option<String> {
    subject_entries(cert, Nid::COMMONNAME).into_iter().next()
}

/// Role encoded in the subject OU entries, if any entry names one.
pub fn role_from_certificate(cert: &X509Ref) -> Option<Role> {
    subject_entries(cert, Nid::ORGANIZATIONALUNITNAME)
        .iter()
        .find_map(|ou| ou.parse::<Role>().ok())
}

fn subject_entries(cert: &X509Ref, nid: Nid) -> Vec<String> {
    cert.subject_name()
        .entries_by_nid(nid)
        .filter_map(|entry| entry.data().as_utf8().ok())
        .map(|text| text.to_string())
        .collect()
}
