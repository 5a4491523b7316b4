/*!
 * Key parser and derivation engine
 *
 * This module parses stored OpenPGP key-rings, finds the User ID bound to
 * a given address and derives the canonical long-form key id and the key
 * expiration carried by that User ID's self-signature.
 */

mod derive;
mod expiration;
mod key_id;

pub use derive::*;
pub use expiration::*;
pub use key_id::*;
