/*!
 * Reconciliation driver
 *
 * Compares each stored record against the key id and expiration derived
 * from its own key-ring, decides whether the record needs a correction and
 * applies corrections through the record store.
 *
 * A stored key id naming a genuinely different key than the key-ring does
 * is reported as a discrepancy and still overwritten: the freshly parsed
 * key material is treated as authoritative.
 */

mod decision;
mod driver;
mod report;

pub use decision::*;
pub use driver::*;
pub use report::*;
