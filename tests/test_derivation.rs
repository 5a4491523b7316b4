// Key id and expiration derivation against generated key-rings

mod fixtures;

use fixtures::*;
use keyfix::error::{error_codes, KeyfixError};
use keyfix::keyring::{derive_key_info, inspect_keyring, keyring_addresses, Expiration};

#[test]
fn test_derivation_is_deterministic() {
    let cert = cert(&["Bob <bob@x.com>"], CREATED_2020, Some(LEAP_YEAR));
    let blob = armored(&cert);

    let first = derive_key_info(&blob, "bob@x.com").unwrap();
    let second = derive_key_info(&blob, "bob@x.com").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.key_id, key_id_of(&cert));
    assert_eq!(first.expiration, Expiration::Known(instant("2021-01-01T00:00:00Z")));
}

#[test]
fn test_address_matching_ignores_case() {
    let cert = cert(&["Bob <Bob@X.com>"], CREATED_2020, Some(LEAP_YEAR));
    let blob = armored(&cert);

    let derived = derive_key_info(&blob, "BOB@x.COM").unwrap();
    assert_eq!(derived.address, "Bob@X.com");
    assert_eq!(derived.key_id, key_id_of(&cert));
}

#[test]
fn test_missing_lifetime_is_unknown() {
    let cert = cert(&["Bob <bob@x.com>"], CREATED_2020, None);
    let derived = derive_key_info(&armored(&cert), "bob@x.com").unwrap();

    assert_eq!(derived.expiration, Expiration::Unknown);
    assert_eq!(derived.expiration.unix_seconds(), 0);
}

#[test]
fn test_identity_not_found_lists_addresses() {
    let cert = cert(&["A <a@x.com>", "B <b@x.com>"], CREATED_2020, Some(LEAP_YEAR));

    match derive_key_info(&armored(&cert), "c@x.com") {
        Err(KeyfixError::IdentityNotFound { available, .. }) => {
            assert_eq!(available, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
        }
        other => panic!("expected IdentityNotFound, got {:?}", other),
    }
}

#[test]
fn test_key_without_identities() {
    let cert = cert(&[], CREATED_2020, Some(LEAP_YEAR));

    match derive_key_info(&armored(&cert), "c@x.com") {
        Err(KeyfixError::IdentityNotFound { available, .. }) => assert!(available.is_empty()),
        other => panic!("expected IdentityNotFound, got {:?}", other),
    }
}

#[test]
fn test_first_matching_certificate_wins() {
    let first = cert(&["Old <shared@x.com>"], CREATED_2020, Some(LEAP_YEAR));
    let second = cert(&["New <shared@x.com>"], CREATED_2020 + 86_400, None);
    let blob = armored_ring(&[&first, &second]);

    let derived = derive_key_info(&blob, "shared@x.com").unwrap();
    assert_eq!(derived.key_id, key_id_of(&first));
    assert!(derived.expiration.is_known());
}

#[test]
fn test_second_certificate_is_searched() {
    let first = cert(&["A <a@x.com>"], CREATED_2020, None);
    let second = cert(&["B <b@x.com>"], CREATED_2020, Some(LEAP_YEAR));
    let blob = armored_ring(&[&first, &second]);

    let derived = derive_key_info(&blob, "b@x.com").unwrap();
    assert_eq!(derived.key_id, key_id_of(&second));
}

#[test]
fn test_binary_and_armored_agree() {
    let cert = cert(&["Bob <bob@x.com>"], CREATED_2020, Some(LEAP_YEAR));

    let from_armor = derive_key_info(&armored(&cert), "bob@x.com").unwrap();
    let from_binary = derive_key_info(&binary(&cert), "bob@x.com").unwrap();
    assert_eq!(from_armor, from_binary);
}

#[test]
fn test_key_id_is_long_uppercase_hex() {
    for _ in 0..8 {
        let cert = cert(&["Bob <bob@x.com>"], CREATED_2020, None);
        let derived = derive_key_info(&armored(&cert), "bob@x.com").unwrap();
        let key_id = derived.key_id.as_str();

        assert_eq!(key_id.len(), 16);
        assert!(key_id
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}

#[test]
fn test_inspect_lists_every_certificate() {
    let first = cert(&["A <a@x.com>", "A2 <a2@x.com>"], CREATED_2020, None);
    let second = cert(&["B <b@x.com>"], CREATED_2020, None);

    let entries = inspect_keyring(&armored_ring(&[&first, &second])).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].key_id.as_ref(), Some(&key_id_of(&first)));
    assert_eq!(entries[0].addresses.len(), 2);
    assert_eq!(entries[1].addresses, vec!["b@x.com".to_string()]);
    assert_eq!(entries[1].created, instant("2020-01-01T00:00:00Z"));
}

#[test]
fn test_first_binding_in_document_order_wins() {
    // Sorted by value, Amy would come first
    let (blob, key_id) = packet_keyring(
        CREATED_2020,
        &[
            Binding::new("Zed <shared@x.com>", Some(LEAP_YEAR)),
            Binding::new("Amy <shared@x.com>", None),
        ],
    );

    let derived = derive_key_info(&blob, "shared@x.com").unwrap();
    assert_eq!(derived.key_id, key_id);
    assert_eq!(derived.expiration, Expiration::Known(instant("2021-01-01T00:00:00Z")));

    let (blob, _) = packet_keyring(
        CREATED_2020,
        &[
            Binding::new("Amy <shared@x.com>", None),
            Binding::new("Zed <shared@x.com>", Some(LEAP_YEAR)),
        ],
    );
    let derived = derive_key_info(&blob, "shared@x.com").unwrap();
    assert_eq!(derived.expiration, Expiration::Unknown);
}

#[test]
fn test_available_addresses_keep_document_order() {
    let (blob, _) = packet_keyring(
        CREATED_2020,
        &[Binding::new("Z <z@x.com>", None), Binding::new("A <a@x.com>", None)],
    );

    match derive_key_info(&blob, "c@x.com") {
        Err(KeyfixError::IdentityNotFound { available, .. }) => {
            assert_eq!(available, vec!["z@x.com".to_string(), "a@x.com".to_string()]);
        }
        other => panic!("expected IdentityNotFound, got {:?}", other),
    }

    let entries = inspect_keyring(&blob).unwrap();
    assert_eq!(entries[0].addresses, vec!["z@x.com".to_string(), "a@x.com".to_string()]);
    assert_eq!(keyring_addresses(&blob).unwrap(), entries[0].addresses);
}

#[test]
fn test_unknown_critical_subpacket_fails_the_keyring() {
    let (blob, _) = packet_keyring(
        CREATED_2020,
        &[Binding {
            userid: "Bob <bob@x.com>",
            lifetime: Some(LEAP_YEAR),
            critical_tag: Some(100),
        }],
    );

    match derive_key_info(&blob, "bob@x.com") {
        Err(err @ KeyfixError::ParseFailure { .. }) => {
            assert_eq!(err.error_code(), error_codes::UNKNOWN_CRITICAL_SUBPACKET);
            assert!(err.to_string().contains("100"));
        }
        other => panic!("expected ParseFailure, got {:?}", other),
    }
    assert!(matches!(inspect_keyring(&blob), Err(KeyfixError::ParseFailure { .. })));
}

#[test]
fn test_unknown_critical_subpacket_on_another_binding_fails_too() {
    let (blob, _) = packet_keyring(
        CREATED_2020,
        &[
            Binding::new("Bob <bob@x.com>", Some(LEAP_YEAR)),
            Binding {
                userid: "Robert <robert@x.com>",
                lifetime: None,
                critical_tag: Some(110),
            },
        ],
    );

    assert!(matches!(
        derive_key_info(&blob, "bob@x.com"),
        Err(KeyfixError::ParseFailure { .. })
    ));
}

#[test]
fn test_trailing_whitespace_on_user_id() {
    let (blob, _) = packet_keyring(CREATED_2020, &[Binding::new("Bob <bob@x.com> ", None)]);
    assert_eq!(derive_key_info(&blob, "bob@x.com").unwrap().address, "bob@x.com");
}
