/// Derives the decimal tag id an SD-player device reports for a UID (§4.7).
///
/// The device expects a decimal triplet of the last four hex bytes of the UID, in reversed byte
/// order; each byte renders as three decimal digits, zero-padded.
pub fn derive_device_tag_id(uid: &str) -> Option<String> {
    let hex: String = uid.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.len() < 8 {
        return None;
    }
    let last_eight = &hex[hex.len() - 8..];
    let mut bytes = Vec::with_capacity(4);
    for chunk in last_eight.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }
    bytes.reverse();
    Some(bytes.iter().map(|b| format!("{:03}", b)).collect::<Vec<_>>().concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverses_and_pads_last_four_bytes() {
        // last four hex bytes: 0x01 0x02 0x0A 0xFF, reversed: FF 0A 02 01 -> "255010002001"
        let derived = derive_device_tag_id("AABB01020AFF").unwrap();
        assert_eq!(derived, "255010002001");
    }

    #[test]
    fn too_short_uid_returns_none() {
        assert_eq!(derive_device_tag_id("ABCD"), None);
    }

    #[test]
    fn ignores_separators() {
        let with_colons = derive_device_tag_id("AA:BB:01:02:0A:FF").unwrap();
        let without = derive_device_tag_id("AABB01020AFF").unwrap();
        assert_eq!(with_colons, without);
    }
}
