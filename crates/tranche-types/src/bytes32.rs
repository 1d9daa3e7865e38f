use crate::error::TypeError;

pub(crate) const LEN: usize = 32;

/// Decode a hex string (optionally `0x`-prefixed) into exactly 32 bytes.
pub(crate) fn decode(input: &str) -> Result<[u8; LEN], TypeError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let raw = hex::decode(digits).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
    <[u8; LEN]>::try_from(raw.as_slice()).map_err(|_| TypeError::MalformedHash {
        expected: LEN,
        actual: raw.len(),
    })
}

/// Domain-separated blake3 digest of a label.
pub(crate) fn derive(domain: &[u8], label: &[u8]) -> [u8; LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(label);
    *hasher.finalize().as_bytes()
}
