//! # Test Fixtures
//!
//! Certificate authorities, leaf identities, CRLs, raw key pairs and signed
//! transactions generated with `openssl` for unit and integration tests.
//!
//! Compiled for `cfg(test)` and behind the `test-utils` feature.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::domain::crypto;
use crate::domain::entities::Role;
use crate::domain::version::BLOCK_VERSION_2330;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private, Public};
use openssl::sign::Signer;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectKeyIdentifier,
};
use openssl::x509::{X509Crl, X509Name, X509};
use shared_types::{
    AuthType, ChainConfig, EndorsementEntry, HashType, KeyValuePair, Member, MultiSignInfo,
    MultiSignVoteInfo, Payload, Transaction, TrustRootConfig, TxType, VoteStatus,
};
use std::time::{SystemTime, UNIX_EPOCH};

const CHAIN_ID: &str = "chain1";

fn ec_private_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).expect("p-256 group");
    PKey::from_ec_key(EcKey::generate(&group).expect("ec key")).expect("pkey")
}

fn sign_sha256(key: &PKey<Private>, message: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new(MessageDigest::sha256(), key).expect("signer");
    signer.update(message).expect("signer update");
    signer.sign_to_vec().expect("sign")
}

fn public_half(key: &PKey<Private>) -> PKey<Public> {
    PKey::public_key_from_der(&key.public_key_to_der().expect("pk der")).expect("pk")
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn subject(org_id: &str, ou: &str, cn: &str) -> X509Name {
    let mut name = X509Name::builder().expect("name builder");
    name.append_entry_by_nid(Nid::ORGANIZATIONNAME, org_id).expect("O");
    name.append_entry_by_nid(Nid::ORGANIZATIONALUNITNAME, ou).expect("OU");
    name.append_entry_by_nid(Nid::COMMONNAME, cn).expect("CN");
    name.build()
}

/// Build a certificate for `key`; `issuer = None` makes it self-signed.
fn build_cert(
    name: &X509Name,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    is_ca: bool,
) -> X509 {
    let mut builder = X509::builder().expect("x509 builder");
    builder.set_version(2).expect("version");

    let mut serial = BigNum::new().expect("bn");
    serial.rand(128, MsbOption::MAYBE_ZERO, false).expect("serial");
    builder
        .set_serial_number(&serial.to_asn1_integer().expect("asn1 serial"))
        .expect("serial");

    builder.set_subject_name(name).expect("subject");
    let issuer_name = issuer.map_or(&**name, |(issuer_cert, _)| issuer_cert.subject_name());
    builder.set_issuer_name(issuer_name).expect("issuer");

    builder
        .set_not_before(&Asn1Time::from_unix((unix_now() - 3600) as _).expect("time"))
        .expect("not before");
    builder
        .set_not_after(&Asn1Time::days_from_now(3650).expect("time"))
        .expect("not after");
    builder.set_pubkey(key).expect("pubkey");

    if is_ca {
        let bc = BasicConstraints::new().critical().ca().build().expect("bc");
        builder.append_extension(bc).expect("bc");
        let ku = KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .digital_signature()
            .build()
            .expect("ku");
        builder.append_extension(ku).expect("ku");
    } else {
        let ku = KeyUsage::new()
            .critical()
            .digital_signature()
            .non_repudiation()
            .build()
            .expect("ku");
        builder.append_extension(ku).expect("ku");
    }

    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .expect("ski");
    builder.append_extension(ski).expect("ski");

    if let Some((issuer_cert, _)) = issuer {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(true)
            .build(&builder.x509v3_context(Some(issuer_cert), None))
            .expect("aki");
        builder.append_extension(aki).expect("aki");
    }

    let signing_key = issuer.map_or(key, |(_, issuer_key)| issuer_key);
    builder
        .sign(signing_key, MessageDigest::sha256())
        .expect("sign certificate");
    builder.build()
}

/// Anything that can sign as a chain member.
pub trait TestSigner {
    fn member(&self) -> Member;
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    fn endorse(&self, message: &[u8]) -> EndorsementEntry {
        EndorsementEntry::new(self.member(), self.sign(message))
    }
}

// =============================================================================
// CERTIFICATE FIXTURES
// =============================================================================

/// A root or intermediate CA of one organization.
pub struct TestCa {
    pub org_id: String,
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestCa {
    /// Fresh self-signed root.
    pub fn root(org_id: &str) -> Self {
        let key = ec_private_key();
        let name = subject(org_id, "root-cert", &format!("ca.{org_id}"));
        let cert = build_cert(&name, &key, None, true);
        Self {
            org_id: org_id.to_string(),
            cert,
            key,
        }
    }

    /// Intermediate CA signed by this CA.
    pub fn intermediate(&self, cn: &str) -> Self {
        let key = ec_private_key();
        let name = subject(&self.org_id, "intermediate-cert", cn);
        let cert = build_cert(&name, &key, Some((&self.cert, &self.key)), true);
        Self {
            org_id: self.org_id.clone(),
            cert,
            key,
        }
    }

    /// Leaf certificate whose OU carries `role`.
    pub fn issue(&self, role: Role, cn: &str) -> TestIdentity {
        let key = ec_private_key();
        let name = subject(&self.org_id, &role.as_str().to_ascii_lowercase(), cn);
        let cert = build_cert(&name, &key, Some((&self.cert, &self.key)), false);
        TestIdentity {
            org_id: self.org_id.clone(),
            cert,
            key,
        }
    }

    pub fn cert_pem(&self) -> String {
        String::from_utf8(self.cert.to_pem().expect("pem")).expect("utf8")
    }

    /// PEM blocks to list under this org in `trust_roots`.
    pub fn trust_root_pems(&self) -> Vec<String> {
        vec![self.cert_pem()]
    }

    /// v2 CRL signed by this CA revoking `revoked`, numbered `number`.
    ///
    /// `openssl` has no CRL builder, so the `TBSCertList` is assembled by hand.
    pub fn crl(&self, revoked: &[&X509], number: u64) -> String {
        const ECDSA_WITH_SHA256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02];
        const THIS_UPDATE: &[u8] = b"250101000000Z";
        const NEXT_UPDATE: &[u8] = b"491231235959Z";

        let alg_id = der::tlv(0x30, &der::tlv(0x06, ECDSA_WITH_SHA256));

        let mut tbs = Vec::new();
        tbs.extend(der::tlv(0x02, &[0x01]));
        tbs.extend(&alg_id);
        tbs.extend(self.cert.subject_name().to_der().expect("issuer der"));
        tbs.extend(der::tlv(0x17, THIS_UPDATE));
        tbs.extend(der::tlv(0x17, NEXT_UPDATE));

        if !revoked.is_empty() {
            let entries: Vec<u8> = revoked
                .iter()
                .flat_map(|cert| {
                    let serial = cert.serial_number().to_bn().expect("serial").to_vec();
                    let mut entry = der::tlv(0x02, &der::unsigned(&serial));
                    entry.extend(der::tlv(0x17, THIS_UPDATE));
                    der::tlv(0x30, &entry)
                })
                .collect();
            tbs.extend(der::tlv(0x30, &entries));
        }

        let ski = self.cert.subject_key_id().expect("ca ski").as_slice().to_vec();
        let aki_value = der::tlv(0x30, &der::tlv(0x80, &ski));
        let mut aki = der::tlv(0x06, &[0x55, 0x1d, 0x23]);
        aki.extend(der::tlv(0x04, &aki_value));

        let number_value = der::tlv(0x02, &der::unsigned(&number.to_be_bytes()));
        let mut crl_number = der::tlv(0x06, &[0x55, 0x1d, 0x14]);
        crl_number.extend(der::tlv(0x04, &number_value));

        let mut extensions = der::tlv(0x30, &aki);
        extensions.extend(der::tlv(0x30, &crl_number));
        tbs.extend(der::tlv(0xa0, &der::tlv(0x30, &extensions)));

        let tbs = der::tlv(0x30, &tbs);
        let signature = sign_sha256(&self.key, &tbs);
        let mut bit_string = vec![0x00];
        bit_string.extend(signature);

        let mut list = tbs;
        list.extend(alg_id);
        list.extend(der::tlv(0x03, &bit_string));
        let list = der::tlv(0x30, &list);

        let crl = X509Crl::from_der(&list).expect("crl der");
        String::from_utf8(crl.to_pem().expect("crl pem")).expect("utf8")
    }
}

/// A leaf certificate and its key.
pub struct TestIdentity {
    pub org_id: String,
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestIdentity {
    pub fn cert_pem(&self) -> Vec<u8> {
        self.cert.to_pem().expect("pem")
    }

    pub fn cert_der(&self) -> Vec<u8> {
        self.cert.to_der().expect("der")
    }

    /// Raw certificate hash under `hash_type`.
    pub fn cert_hash(&self, hash_type: HashType) -> Vec<u8> {
        crypto::hash(hash_type, &self.cert_der()).expect("hash")
    }

    /// `CERT_HASH` member referencing this certificate.
    pub fn cert_hash_member(&self, hash_type: HashType) -> Member {
        Member::cert_hash(self.org_id.clone(), self.cert_hash(hash_type))
    }
}

impl TestSigner for TestIdentity {
    fn member(&self) -> Member {
        Member::cert(self.org_id.clone(), self.cert_pem())
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        sign_sha256(&self.key, message)
    }
}

// =============================================================================
// RAW KEY FIXTURES
// =============================================================================

/// A raw EC key pair attributed to an organization.
pub struct TestKey {
    pub org_id: String,
    pub key: PKey<Private>,
}

impl TestKey {
    pub fn generate(org_id: &str) -> Self {
        Self {
            org_id: org_id.to_string(),
            key: ec_private_key(),
        }
    }

    pub fn public_key(&self) -> PKey<Public> {
        public_half(&self.key)
    }

    pub fn pem(&self) -> String {
        String::from_utf8(self.key.public_key_to_pem().expect("pem")).expect("utf8")
    }

    pub fn der(&self) -> Vec<u8> {
        self.key.public_key_to_der().expect("der")
    }

    pub fn node_id(&self) -> String {
        crypto::node_id(&self.public_key()).expect("node id")
    }
}

impl TestSigner for TestKey {
    fn member(&self) -> Member {
        Member::public_key(self.org_id.clone(), self.pem())
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        sign_sha256(&self.key, message)
    }
}

// =============================================================================
// CHAIN CONFIGS AND TRANSACTIONS
// =============================================================================

/// Certificate-mode chain config trusting each CA's root.
pub fn cert_chain_config(cas: &[&TestCa]) -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID.to_string(),
        block_version: BLOCK_VERSION_2330,
        auth_type: AuthType::PermissionedWithCert,
        trust_roots: cas
            .iter()
            .map(|ca| TrustRootConfig {
                org_id: ca.org_id.clone(),
                root: ca.trust_root_pems(),
            })
            .collect(),
        ..ChainConfig::default()
    }
}

/// Permissioned public-key chain config; each key is an admin of its org.
pub fn key_chain_config(admins: &[&TestKey]) -> ChainConfig {
    let mut trust_roots: Vec<TrustRootConfig> = Vec::new();
    for admin in admins {
        match trust_roots.iter_mut().find(|root| root.org_id == admin.org_id) {
            Some(root) => root.root.push(admin.pem()),
            None => trust_roots.push(TrustRootConfig {
                org_id: admin.org_id.clone(),
                root: vec![admin.pem()],
            }),
        }
    }
    ChainConfig {
        chain_id: CHAIN_ID.to_string(),
        block_version: BLOCK_VERSION_2330,
        auth_type: AuthType::PermissionedWithKey,
        trust_roots,
        ..ChainConfig::default()
    }
}

/// Public chain config with the given admin keys.
pub fn public_chain_config(admins: &[&TestKey]) -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID.to_string(),
        block_version: BLOCK_VERSION_2330,
        auth_type: AuthType::Public,
        trust_roots: vec![TrustRootConfig {
            org_id: crate::service::pk_provider::PUBLIC_ADMIN_ORG.to_string(),
            root: admins.iter().map(|admin| admin.pem()).collect(),
        }],
        ..ChainConfig::default()
    }
}

/// Invoke payload for `contract.method` with string parameters.
pub fn payload(contract: &str, method: &str, params: &[(&str, &str)]) -> Payload {
    Payload {
        chain_id: CHAIN_ID.to_string(),
        tx_type: TxType::InvokeContract,
        tx_id: format!("tx-{contract}-{method}"),
        timestamp: unix_now(),
        expiration_time: 0,
        contract_name: contract.to_string(),
        method: method.to_string(),
        parameters: params
            .iter()
            .map(|(key, value)| KeyValuePair::new(*key, value.as_bytes()))
            .collect(),
        sequence: 0,
    }
}

/// Transaction signed by `sender` and endorsed by `endorsers`.
pub fn transaction(
    payload: Payload,
    sender: &dyn TestSigner,
    endorsers: &[&dyn TestSigner],
) -> Transaction {
    let bytes = payload.signing_bytes().expect("payload bytes");
    let mut tx = Transaction::new(payload);
    tx.sender = Some(sender.endorse(&bytes));
    tx.endorsers = endorsers.iter().map(|e| e.endorse(&bytes)).collect();
    tx
}

/// Multi-sign proposal carrying the given votes.
pub fn multi_sign_info(payload: Payload, votes: &[(&dyn TestSigner, VoteStatus)]) -> MultiSignInfo {
    let bytes = payload.signing_bytes().expect("payload bytes");
    let mut info = MultiSignInfo::new(payload);
    info.vote_infos = votes
        .iter()
        .map(|(signer, vote)| MultiSignVoteInfo {
            vote: *vote,
            endorsement: signer.endorse(&bytes),
        })
        .collect();
    info
}

mod der {
    /// Encode one TLV with a definite length.
    pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        let len = content.len();
        if len < 0x80 {
            out.push(len as u8);
        } else {
            let bytes: Vec<u8> = len
                .to_be_bytes()
                .into_iter()
                .skip_while(|b| *b == 0)
                .collect();
            out.push(0x80 | bytes.len() as u8);
            out.extend(bytes);
        }
        out.extend_from_slice(content);
        out
    }

    /// Minimal two's-complement content of a non-negative big-endian integer.
    pub fn unsigned(magnitude: &[u8]) -> Vec<u8> {
        let trimmed: Vec<u8> = magnitude.iter().copied().skip_while(|b| *b == 0).collect();
        match trimmed.first().copied() {
            None => vec![0],
            Some(first) if first & 0x80 != 0 => {
                let mut out = vec![0];
                out.extend(trimmed);
                out
            }
            Some(_) => trimmed,
        }
    }
}
