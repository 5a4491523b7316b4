//! Shared helpers for unit tests: generated certificates with chosen
//! creation times, lifetimes and User IDs.

use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use sequoia_openpgp::cert::{Cert, CertBuilder};
use sequoia_openpgp::serialize::SerializeInto;

use crate::keyring::KeyId;

/// 2020-01-01T00:00:00Z
pub const CREATED_2020: u64 = 1_577_836_800;

pub fn instant(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 instant")
        .with_timezone(&Utc)
}

/// Generate a certificate
pub fn cert(userids: &[&str], created: u64, lifetime: Option<u64>) -> Cert {
    let mut builder = CertBuilder::new()
        .set_creation_time(UNIX_EPOCH + Duration::from_secs(created))
        .set_validity_period(lifetime.map(Duration::from_secs));
    for userid in userids {
        builder = builder.add_userid(*userid);
    }
    let (cert, _revocation) = builder.generate().expect("certificate generation");
    cert
}

/// ASCII-armored serialization of a certificate
pub fn armored(cert: &Cert) -> Vec<u8> {
    cert.armored().to_vec().expect("armoring a certificate")
}

pub fn key_id_of(cert: &Cert) -> KeyId {
    KeyId::from_openpgp(&cert.keyid()).expect("certificate key id")
}
