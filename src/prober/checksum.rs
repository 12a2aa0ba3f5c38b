/// Internet checksum (RFC 1071) over `data`.
///
/// Words are summed in little-endian pairing and the complemented result is
/// byte-swapped, so the returned value is already in network order: write it
/// with `to_be_bytes` into the checksum field.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum = sum.wrapping_add(u32::from(word[0]) + u32::from(word[1]) * 256);
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add(u32::from(*last));
    }

    sum = (sum >> 16) + (sum & 0xffff);
    sum += sum >> 16;

    (!sum as u16).swap_bytes()
}
