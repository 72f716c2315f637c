use sha2::{Digest, Sha256};

use crate::gateway::GatewayFields;

/// Percent-encodes a string the way ECMAScript's `encodeURIComponent` does: everything except
/// `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped, as UTF-8 bytes with upper-case hex digits.
pub fn encode_uri_component(s: &str) -> String {
    urlencoding::encode(s)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

// After lower-casing, these escapes are turned back into the literal characters the gateway expects.
const GATEWAY_SUBSTITUTIONS: [(&str, &str); 10] = [
    ("%20", "+"),
    ("%2d", "-"),
    ("%5f", "_"),
    ("%2e", "."),
    ("%21", "!"),
    ("%2a", "*"),
    ("%28", "("),
    ("%29", ")"),
    ("%3c", "<"),
    ("%3e", ">"),
];

/// Computes the ECPay `CheckMacValue` for the given fields.
///
/// 1. Sort the fields by name and join them as `key=value` pairs with `&`.
/// 2. Wrap the result as `HashKey={key}&...&HashIV={iv}`.
/// 3. URL-encode the whole string and lower-case it.
/// 4. Apply the gateway's character substitutions.
/// 5. SHA-256 the result and render the digest as upper-case hex.
///
/// A `CheckMacValue` entry in `fields` is *included* in the calculation. Callers verifying a callback must remove it
/// first.
pub fn check_mac_value(fields: &GatewayFields, hash_key: &str, hash_iv: &str) -> String {
    let raw = format!("HashKey={hash_key}&{}&HashIV={hash_iv}", fields.canonical_string());
    let mut encoded = encode_uri_component(&raw).to_lowercase();
    for (from, to) in GATEWAY_SUBSTITUTIONS {
        encoded = encoded.replace(from, to);
    }
    let digest = Sha256::digest(encoded.as_bytes());
    hex::encode_upper(digest)
}
