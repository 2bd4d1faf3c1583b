/// Decode an 8-byte little-endian integer; anything else is treated as absent.
pub(crate) fn decode_i64(bytes: &[u8]) -> Option<i64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_le_bytes(arr))
}
