use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// The content-hash digest algorithm. Configurable per store via
/// `merkle_hash_algorithm` (spec §6); the same algorithm is used for both
/// record content hashes and Merkle leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

impl HashAlgorithm {
    /// Digest length in bytes (32/48/64).
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Hash arbitrary bytes, returning the raw digest.
    pub fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Hash arbitrary bytes, returning lowercase hex.
    pub fn hash_hex(self, data: &[u8]) -> String {
        hex_encode(&self.hash(data))
    }

    /// Parse from the §6 config string (`"sha256"`/`"sha384"`/`"sha512"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }
}

/// Lowercase hex encoding, used for content hashes and Merkle node hashes.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

/// Decode a lowercase hex string back into raw bytes. Returns `None` on a
/// malformed string (odd length or non-hex digit).
pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// Combine two canonical fields into the `name:value|` fragment used by
/// record content-hash canonicalization (spec §3).
pub fn canonical_field(name: &str, value: &str) -> String {
    let mut s = String::with_capacity(name.len() + value.len() + 2);
    s.push_str(name);
    s.push(':');
    s.push_str(value);
    s.push('|');
    s
}

/// Canonical form of an optional string field: verbatim if present, the
/// literal `null` if absent.
pub fn canonical_opt_str(value: Option<&str>) -> String {
    value.unwrap_or("null").to_string()
}

/// Canonical form of a sorted tag set: a JSON array of the (already sorted)
/// strings.
pub fn canonical_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Canonical form of a bool.
pub fn canonical_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let bytes = vec![0x00, 0x0f, 0xff, 0xa5];
        let hex = hex_encode(&bytes);
        assert_eq!(hex, "000fffa5");
        assert_eq!(hex_decode(&hex).unwrap(), bytes);
    }

    #[test]
    fn digest_lengths_match_algorithm() {
        assert_eq!(HashAlgorithm::Sha256.digest_len(), 32);
        assert_eq!(HashAlgorithm::Sha384.digest_len(), 48);
        assert_eq!(HashAlgorithm::Sha512.digest_len(), 64);
        assert_eq!(HashAlgorithm::Sha256.hash(b"x").len(), 32);
        assert_eq!(HashAlgorithm::Sha384.hash(b"x").len(), 48);
        assert_eq!(HashAlgorithm::Sha512.hash(b"x").len(), 64);
    }

    #[test]
    fn parse_roundtrips_known_names() {
        assert_eq!(HashAlgorithm::parse("sha256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::parse("sha384"), Some(HashAlgorithm::Sha384));
        assert_eq!(HashAlgorithm::parse("sha512"), Some(HashAlgorithm::Sha512));
        assert_eq!(HashAlgorithm::parse("md5"), None);
    }
}
