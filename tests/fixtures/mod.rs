// Generated key-rings shared by the integration tests
#![allow(dead_code)]

use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use keyfix::keyring::KeyId;
use sequoia_openpgp::cert::{Cert, CertBuilder};
use sequoia_openpgp::packet::signature::subpacket::{Subpacket, SubpacketTag, SubpacketValue};
use sequoia_openpgp::packet::signature::SignatureBuilder;
use sequoia_openpgp::packet::UserID;
use sequoia_openpgp::serialize::{Serialize, SerializeInto};
use sequoia_openpgp::types::SignatureType;
use sequoia_openpgp::Packet;

/// 2020-01-01T00:00:00Z
pub const CREATED_2020: u64 = 1_577_836_800;

/// 366 days: 2020-01-01 plus this lands on 2021-01-01
pub const LEAP_YEAR: u64 = 31_622_400;

pub fn instant(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn cert(userids: &[&str], created: u64, lifetime: Option<u64>) -> Cert {
    let mut builder = CertBuilder::new()
        .set_creation_time(UNIX_EPOCH + Duration::from_secs(created))
        .set_validity_period(lifetime.map(Duration::from_secs));
    for userid in userids {
        builder = builder.add_userid(*userid);
    }
    builder.generate().unwrap().0
}

pub fn armored(cert: &Cert) -> Vec<u8> {
    cert.armored().to_vec().unwrap()
}

pub fn binary(cert: &Cert) -> Vec<u8> {
    cert.to_vec().unwrap()
}

/// Several certificates in one armored key-ring
pub fn armored_ring(certs: &[&Cert]) -> Vec<u8> {
    certs.iter().flat_map(|c| armored(c)).collect()
}

pub fn key_id_of(cert: &Cert) -> KeyId {
    KeyId::from_openpgp(&cert.keyid()).unwrap()
}

/// One User ID binding written by `packet_keyring`
pub struct Binding<'a> {
    pub userid: &'a str,
    pub lifetime: Option<u64>,
    /// Add a critical hashed sub-packet with this type
    pub critical_tag: Option<u8>,
}

impl<'a> Binding<'a> {
    pub fn new(userid: &'a str, lifetime: Option<u64>) -> Self {
        Self {
            userid,
            lifetime,
            critical_tag: None,
        }
    }
}

/// Binary key-ring written packet by packet, so User IDs appear exactly in
/// the given order. Returns the blob and the primary key id.
pub fn packet_keyring(created: u64, bindings: &[Binding]) -> (Vec<u8>, KeyId) {
    let base = cert(&[], created, None);
    let mut signer = base
        .primary_key()
        .key()
        .clone()
        .parts_into_secret()
        .unwrap()
        .into_keypair()
        .unwrap();

    let mut blob = Vec::new();
    let (public, _) = base.primary_key().key().clone().take_secret();
    Packet::from(public).serialize(&mut blob).unwrap();

    for binding in bindings {
        let userid = UserID::from(binding.userid);
        let mut builder = SignatureBuilder::new(SignatureType::PositiveCertification)
            .set_signature_creation_time(UNIX_EPOCH + Duration::from_secs(created))
            .unwrap();
        if let Some(lifetime) = binding.lifetime {
            builder = builder
                .set_key_validity_period(Duration::from_secs(lifetime))
                .unwrap();
        }
        if let Some(tag) = binding.critical_tag {
            builder = builder
                .modify_hashed_area(|mut area| {
                    area.add(Subpacket::new(
                        SubpacketValue::Unknown {
                            tag: SubpacketTag::from(tag),
                            body: vec![0x2a],
                        },
                        true,
                    )?)?;
                    Ok(area)
                })
                .unwrap();
        }

        let sig = userid.bind(&mut signer, &base, builder).unwrap();
        Packet::from(userid).serialize(&mut blob).unwrap();
        Packet::from(sig).serialize(&mut blob).unwrap();
    }

    (blob, key_id_of(&base))
}
