// Key-ring parsing and key id / expiration derivation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sequoia_openpgp as openpgp;
use openpgp::cert::{Cert, CertParser};
use openpgp::packet::signature::subpacket::SubpacketTag;
use openpgp::packet::{Signature, UserID};
use openpgp::parse::{PacketParser, PacketParserResult, Parse};
use openpgp::{Fingerprint, Packet};

use super::{Expiration, KeyId};
use crate::error::{error_codes, KeyfixError, KeyfixResult};

/// Key id and expiration derived for one address of a key-ring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedKeyInfo {
    /// Primary key id of the certificate holding the matched User ID
    pub key_id: KeyId,
    /// Expiration from the matched User ID's self-signature
    pub expiration: Expiration,
    /// The address as written on the matched User ID
    pub address: String,
}

/// One certificate of a key-ring, as shown by `inspect_keyring`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyringEntry {
    pub key_id: Option<KeyId>,
    pub created: DateTime<Utc>,
    pub addresses: Vec<String>,
}

/// Parse a serialized key-ring, armored or binary.
///
/// Any parse error fails the whole key-ring, as does a key-ring without a
/// single certificate or a signature carrying a critical sub-packet of an
/// unrecognized type.
pub fn parse_keyring(blob: &[u8]) -> KeyfixResult<Vec<Cert>> {
    Ok(parse_ordered(blob)?
        .into_iter()
        .map(|(cert, _)| cert)
        .collect())
}

/// Certificates paired with their User IDs in document order
type OrderedCerts = Vec<(Cert, Vec<UserID>)>;

fn parse_failure(e: anyhow::Error) -> KeyfixError {
    KeyfixError::parse_failure(&format!("{:#}", e), error_codes::KEYRING_PARSE_FAILED)
}

// Sub-packet types the parser has no definition for
fn is_unrecognized(tag: SubpacketTag) -> bool {
    matches!(
        tag,
        SubpacketTag::Unknown(_) | SubpacketTag::Reserved(_) | SubpacketTag::Private(_)
    )
}

fn check_signature(sig: &Signature) -> KeyfixResult<()> {
    match sig
        .hashed_area()
        .iter()
        .find(|sp| sp.critical() && is_unrecognized(sp.tag()))
    {
        Some(sp) => Err(KeyfixError::parse_failure(
            &format!(
                "unknown critical signature subpacket type {}",
                u8::from(sp.tag())
            ),
            error_codes::UNKNOWN_CRITICAL_SUBPACKET,
        )),
        None => Ok(()),
    }
}

// Walks the raw packet stream: rejects unrecognized critical sub-packets and
// records, per primary key, the order its User IDs appear in. Canonicalized
// certificates keep their User IDs sorted, not in document order.
fn document_order(blob: &[u8]) -> KeyfixResult<Vec<(Fingerprint, Vec<UserID>)>> {
    let mut order: Vec<(Fingerprint, Vec<UserID>)> = Vec::new();

    let mut ppr = PacketParser::from_bytes(blob).map_err(parse_failure)?;
    while let PacketParserResult::Some(pp) = ppr {
        let (packet, next) = pp.next().map_err(parse_failure)?;
        match packet {
            Packet::PublicKey(key) => order.push((key.fingerprint(), Vec::new())),
            Packet::SecretKey(key) => order.push((key.fingerprint(), Vec::new())),
            Packet::UserID(userid) => {
                if let Some((_, userids)) = order.last_mut() {
                    if !userids.contains(&userid) {
                        userids.push(userid);
                    }
                }
            }
            Packet::Signature(sig) => check_signature(&sig)?,
            _ => {}
        }
        ppr = next;
    }

    Ok(order)
}

fn parse_ordered(blob: &[u8]) -> KeyfixResult<OrderedCerts> {
    let parser = CertParser::from_bytes(blob).map_err(parse_failure)?;
    let certs = parser
        .collect::<openpgp::Result<Vec<Cert>>>()
        .map_err(parse_failure)?;

    if certs.is_empty() {
        return Err(KeyfixError::parse_failure(
            "no key material found",
            error_codes::KEYRING_EMPTY,
        ));
    }

    let mut order = document_order(blob)?;

    Ok(certs
        .into_iter()
        .map(|cert| {
            let fingerprint = cert.fingerprint();
            let mut userids = order
                .iter()
                .position(|(fp, _)| *fp == fingerprint)
                .map(|pos| order.remove(pos).1)
                .unwrap_or_default();

            // Anything the packet walk missed goes last, in canonical order
            for ua in cert.userids() {
                if !userids.contains(ua.userid()) {
                    userids.push(ua.userid().clone());
                }
            }
            userids.retain(|u| cert.userids().any(|ua| ua.userid() == u));

            (cert, userids)
        })
        .collect())
}

/// The address a User ID binds: its email, or the raw User ID when it
/// carries no parseable email. Surrounding whitespace is ignored.
pub fn binding_address(userid: &UserID) -> String {
    let raw = String::from_utf8_lossy(userid.value());
    let raw = raw.trim();

    match UserID::from(raw).email2() {
        Ok(Some(email)) => email.to_string(),
        _ => raw.to_string(),
    }
}

/// Every address bound in the key-ring, in document order
pub fn keyring_addresses(blob: &[u8]) -> KeyfixResult<Vec<String>> {
    Ok(collect_addresses(&parse_ordered(blob)?))
}

fn collect_addresses(certs: &OrderedCerts) -> Vec<String> {
    certs
        .iter()
        .flat_map(|(_, userids)| userids.iter().map(binding_address))
        .collect()
}

/// Derive the long-form key id and the expiration for `address`.
///
/// Addresses compare case-insensitively. Certificates and their User IDs
/// are scanned in document order and the first match wins.
pub fn derive_key_info(blob: &[u8], address: &str) -> KeyfixResult<DerivedKeyInfo> {
    let target = address.to_lowercase();
    let certs = parse_ordered(blob)?;

    for (cert, userids) in &certs {
        for userid in userids {
            let bound = binding_address(userid);
            if bound.to_lowercase() != target {
                continue;
            }

            let key_id = KeyId::from_openpgp(&cert.keyid())
                .ok_or_else(|| KeyfixError::empty_key_id(address))?;

            let self_signature = cert
                .userids()
                .find(|ua| ua.userid() == userid)
                .and_then(|ua| ua.self_signatures().into_iter().next().cloned())
                .ok_or_else(|| {
                    KeyfixError::parse_failure(
                        &format!("user id {} has no self-signature", bound),
                        error_codes::SELF_SIGNATURE_MISSING,
                    )
                })?;

            let creation = DateTime::<Utc>::from(cert.primary_key().key().creation_time());
            let expiration =
                Expiration::from_lifetime(creation, self_signature.key_validity_period());

            return Ok(DerivedKeyInfo {
                key_id,
                expiration,
                address: bound,
            });
        }
    }

    let available = collect_addresses(&certs);
    if available.is_empty() {
        log::info!("{} No identities", target);
    } else {
        log::info!("{} Identities: {}", target, available.join(" "));
    }

    Err(KeyfixError::identity_not_found(address, available))
}

/// List the certificates of a key-ring with their key ids and addresses
pub fn inspect_keyring(blob: &[u8]) -> KeyfixResult<Vec<KeyringEntry>> {
    let certs = parse_ordered(blob)?;

    Ok(certs
        .iter()
        .map(|(cert, userids)| KeyringEntry {
            key_id: KeyId::from_openpgp(&cert.keyid()),
            created: DateTime::<Utc>::from(cert.primary_key().key().creation_time()),
            addresses: userids.iter().map(binding_address).collect(),
        })
        .collect())
}
