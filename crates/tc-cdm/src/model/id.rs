//! 256-bit identifiers for CDM vertices.
//!
//! CDM identifiers are opaque 32-byte values. They are compared by bytes and
//! carry no version or variant bits.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// A 32-byte opaque identifier.
pub type Uuid = [u8; 32];

/// The all-zero identifier.
pub const NIL_UUID: Uuid = [0u8; 32];

/// Derives a deterministic identifier from input bytes using SHA-256.
///
/// Producers that need stable ids across runs (for example one id per
/// `(host, pid, start time)` triple) hash the identifying tuple instead of
/// drawing random bytes.
pub fn derived_uuid(input: &[u8]) -> Uuid {
    let hash = Sha256::digest(input);
    let mut id = [0u8; 32];
    id.copy_from_slice(&hash);
    id
}

/// Derives the identifier of a subject from host and process identity.
///
/// ```text
/// uuid = SHA-256("cdm:subject:" || host || pid_le || start_micros_le)
/// ```
pub fn subject_uuid(host: &Uuid, pid: i32, start_timestamp_micros: i64) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(SUBJECT_PREFIX);
    hasher.update(host);
    hasher.update(pid.to_le_bytes());
    hasher.update(start_timestamp_micros.to_le_bytes());
    hasher.finalize().into()
}

/// Domain separator prefix for subject derivation.
const SUBJECT_PREFIX: &[u8] = b"cdm:subject:";

/// Formats an identifier as lowercase hex.
pub fn format_uuid(id: &Uuid) -> String {
    let mut s = String::with_capacity(64);
    for byte in id {
        let _ = write!(s, "{:02x}", byte);
    }
    s
}

/// Parses an identifier from 64 hex digits (hyphens are ignored).
pub fn parse_uuid(s: &str) -> Option<Uuid> {
    let hex: String = s.chars().filter(|c| *c != '-').collect();
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let mut id = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).ok()?;
        id[i] = u8::from_str_radix(byte_str, 16).ok()?;
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_uuid_deterministic() {
        let id1 = derived_uuid(b"hello world");
        let id2 = derived_uuid(b"hello world");
        assert_eq!(id1, id2);

        let id3 = derived_uuid(b"different");
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_subject_uuid_distinguishes_pid_reuse() {
        let host = derived_uuid(b"host-a");
        let first = subject_uuid(&host, 4242, 1_000);
        let reused = subject_uuid(&host, 4242, 9_000);
        assert_ne!(first, reused);
        assert_eq!(first, subject_uuid(&host, 4242, 1_000));
    }

    #[test]
    fn test_format_parse_roundtrip() {
        let id = derived_uuid(b"test");
        let formatted = format_uuid(&id);
        assert_eq!(formatted.len(), 64);
        assert_eq!(parse_uuid(&formatted), Some(id));
    }

    #[test]
    fn test_format_is_lowercase_hex() {
        let mut id = NIL_UUID;
        id[0] = 0xAB;
        id[31] = 0x0F;
        let formatted = format_uuid(&id);
        assert!(formatted.starts_with("ab00"));
        assert!(formatted.ends_with("000f"));
        assert_eq!(formatted.len(), 64);
        assert_eq!(format_uuid(&NIL_UUID), "0".repeat(64));
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert_eq!(parse_uuid("550e8400-e29b-41d4-a716-446655440000"), None);
        assert_eq!(parse_uuid(&"zz".repeat(32)), None);
    }
}
