//! Jenkins lookup3 hashing and the stable path hash used by root tables
//!
//! Root files never store file names. They store a 64-bit hash of the
//! normalized path computed with Bob Jenkins' `hashlittle2()`, so callers
//! that want to open a file by name must hash it the same way.

/// Compute `hashlittle2()` from Bob Jenkins' lookup3.c.
///
/// `pc` and `pb` are the two seeds. The returned pair is `(c, b)`, the
/// primary and secondary 32-bit hashes.
///
/// ```
/// use cascread_crypto::jenkins::hashlittle2;
///
/// assert_eq!(hashlittle2(b"", 0, 0), (0xdeadbeef, 0xdeadbeef));
/// ```
pub fn hashlittle2(data: &[u8], pc: u32, pb: u32) -> (u32, u32) {
    let mut a = 0xdead_beef_u32
        .wrapping_add(u32::try_from(data.len()).unwrap_or(u32::MAX))
        .wrapping_add(pc);
    let mut b = a;
    let mut c = a.wrapping_add(pb);

    if data.is_empty() {
        return (c, b);
    }

    let mut rest = data;
    while rest.len() > 12 {
        a = a.wrapping_add(read_word(&rest[0..4]));
        b = b.wrapping_add(read_word(&rest[4..8]));
        c = c.wrapping_add(read_word(&rest[8..12]));
        mix(&mut a, &mut b, &mut c);
        rest = &rest[12..];
    }

    // Last block: 1..=12 bytes, zero-padded into three words
    let mut tail = [0u8; 12];
    tail[..rest.len()].copy_from_slice(rest);
    a = a.wrapping_add(read_word(&tail[0..4]));
    b = b.wrapping_add(read_word(&tail[4..8]));
    c = c.wrapping_add(read_word(&tail[8..12]));
    final_mix(&mut a, &mut b, &mut c);

    (c, b)
}

/// Stable 64-bit hash of a file path as stored in root tables.
///
/// The path is normalized first: `/` becomes `\`, letters are upper-cased,
/// and anything outside ASCII is replaced with `?`. The result is
/// `(c << 32) | b` of [`hashlittle2`] with zero seeds.
///
/// ```
/// use cascread_crypto::jenkins::name_hash;
///
/// assert_eq!(name_hash("interface/icons/a.blp"), name_hash("INTERFACE\\ICONS\\A.BLP"));
/// ```
pub fn name_hash(path: &str) -> u64 {
    let normalized: Vec<u8> = path
        .chars()
        .map(|ch| match ch {
            '/' => b'\\',
            ch if ch.is_ascii() => ch.to_ascii_uppercase() as u8,
            _ => b'?',
        })
        .collect();

    let (c, b) = hashlittle2(&normalized, 0, 0);
    (u64::from(c) << 32) | u64::from(b)
}

fn read_word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(4);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(6);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(8);
    *b = b.wrapping_add(*a);
    *a = a.wrapping_sub(*c);
    *a ^= c.rotate_left(16);
    *c = c.wrapping_add(*b);
    *b = b.wrapping_sub(*a);
    *b ^= a.rotate_left(19);
    *a = a.wrapping_add(*c);
    *c = c.wrapping_sub(*b);
    *c ^= b.rotate_left(4);
    *b = b.wrapping_add(*a);
}

fn final_mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(14));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(11));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(25));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(16));
    *a ^= *c;
    *a = a.wrapping_sub(c.rotate_left(4));
    *b ^= *a;
    *b = b.wrapping_sub(a.rotate_left(14));
    *c ^= *b;
    *c = c.wrapping_sub(b.rotate_left(24));
}
