#![no_main]

use arbitrary::Arbitrary;
use keyfix::keyring::{derive_key_info, inspect_keyring};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct KeyringFuzzInput {
    address: String,
    keyring: Vec<u8>,
}

fuzz_target!(|input: KeyringFuzzInput| {
    // Derivation must never panic, whatever the stored bytes are
    if let Ok(derived) = derive_key_info(&input.keyring, &input.address) {
        assert_eq!(derived.key_id.as_str().len(), 16);
        assert_eq!(derived.address.to_lowercase(), input.address.to_lowercase());
    }

    if let Ok(entries) = inspect_keyring(&input.keyring) {
        assert!(!entries.is_empty());
    }
});
