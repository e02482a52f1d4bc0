// src/ids.rs

//! Deterministic identifiers.
//!
//! Everything here is a pure function of its inputs: the same script path
//! and arguments produce the same isolated id on every run and in every
//! process, which is what makes the ids usable as cache keys.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::identity::ParsedArguments;

type HmacSha256 = Hmac<Sha256>;

/// Key for the argument checksum.
const CHECKSUM_KEY: &[u8] = b"chore";

/// Keyed checksum of parsed arguments.
///
/// Parameters and flags are visited in name order; every string is
/// length-prefixed so `("ab", "c")` and `("a", "bc")` never collide.
pub fn checksum(args: &ParsedArguments) -> [u8; 32] {
    let mut mac = new_mac(CHECKSUM_KEY);

    write_str(&mut mac, "parameters");
    for (name, values) in &args.parameters {
        write_str(&mut mac, name);
        write_len(&mut mac, values.len());
        for value in values {
            write_str(&mut mac, value);
        }
    }

    write_str(&mut mac, "flags");
    for (name, value) in &args.flags {
        write_str(&mut mac, name);
        mac.update(&[u8::from(*value)]);
    }

    write_str(&mut mac, "positional");
    write_len(&mut mac, args.positional.len());
    for arg in &args.positional {
        write_str(&mut mac, arg);
    }

    finish(mac)
}

/// One link of an HMAC chain: `HMAC-SHA256(key, data)`.
pub fn chain(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = new_mac(key);
    mac.update(data);
    finish(mac)
}

/// Isolated id of a script invocation: `chain(checksum(args), path)`.
pub fn isolated_id(script_path: &str, args: &ParsedArguments) -> String {
    hex::encode(chain(&checksum(args), script_path.as_bytes()))
}

/// Chain id: the isolated id linked to whatever chain id the parent
/// invocation exported. Without a parent it is the isolated id itself.
pub fn chain_id(isolated_id: &str, inherited: Option<&str>) -> String {
    match inherited.filter(|s| !s.is_empty()) {
        Some(parent) => hex::encode(chain(isolated_id.as_bytes(), parent.as_bytes())),
        None => isolated_id.to_string(),
    }
}

/// Hex HMAC of `app` keyed with a machine secret. Used so the raw machine id
/// never leaks into script environments.
pub fn protected_id(secret: &str, app: &str) -> String {
    hex::encode(chain(secret.as_bytes(), app.as_bytes()))
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length")
}

fn finish(mac: HmacSha256) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn write_len(mac: &mut HmacSha256, len: usize) {
    mac.update(&(len as u64).to_be_bytes());
}

fn write_str(mac: &mut HmacSha256, s: &str) {
    write_len(mac, s.len());
    mac.update(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_PATH: &str = "/opt/chore/ns/script";

    #[test]
    fn empty_arguments_checksum_fixture() {
        assert_eq!(
            hex::encode(checksum(&ParsedArguments::default())),
            "a527a34e34d4a35e5947f477da3c87b0a2b26d276852c5f8ced8a15560e1ea7d"
        );
    }

    #[test]
    fn isolated_id_fixture() {
        assert_eq!(
            isolated_id(FIXTURE_PATH, &ParsedArguments::default()),
            "0b251fb001d708a5ca86d62a9bed5bd4cb0371b7e8fb18f83e463c582caa8c93"
        );
    }

    #[test]
    fn isolated_id_fixture_with_arguments() {
        let mut args = ParsedArguments::default();
        args.parameters
            .insert("count".to_string(), vec!["1".to_string(), "2".to_string()]);
        args.flags.insert("verbose".to_string(), true);
        args.positional.push("a".to_string());

        assert_eq!(
            isolated_id(FIXTURE_PATH, &args),
            "ad88decccf55baa8354f936ca4736989ca5444f3a23e44b8811c13ffeac82eeb"
        );
    }

    #[test]
    fn chain_id_links_to_parent() {
        let iso = isolated_id(FIXTURE_PATH, &ParsedArguments::default());
        assert_eq!(chain_id(&iso, None), iso);
        assert_eq!(chain_id(&iso, Some("")), iso);
        assert_eq!(
            chain_id(&iso, Some("parent-chain")),
            "2da0bd6abba0b58089d5a3bbbd12dc313e38197e69eab1bc8d3fd6b9bbbd2c17"
        );
    }

    #[test]
    fn flag_value_changes_checksum() {
        let mut on = ParsedArguments::default();
        on.flags.insert("x".to_string(), true);
        let mut off = ParsedArguments::default();
        off.flags.insert("x".to_string(), false);

        assert_ne!(checksum(&on), checksum(&off));
    }

    #[test]
    fn length_prefix_prevents_concatenation_collisions() {
        let mut a = ParsedArguments::default();
        a.positional = vec!["ab".to_string(), "c".to_string()];
        let mut b = ParsedArguments::default();
        b.positional = vec!["a".to_string(), "bc".to_string()];

        assert_ne!(checksum(&a), checksum(&b));
    }
}
