//! Checksum engine.
//!
//! One CRC-16 (polynomial 0x8005, reflected, table driven) used two ways:
//!
//! - **Name hash**: seed `0xFFFF`, complemented at the end. Turns topic and
//!   key names into 16-bit ids. Same parameters as CRC-16/USB.
//! - **Field checksum**: seed `0x0000`, no complement. Written in front of
//!   every payload it covers. Same parameters as CRC-16/ARC.
//!
//! The 32-bit mesh partition key hash is plain CRC-32 (IEEE).

/// Reflected form of polynomial 0x8005
const POLY_REFLECTED: u16 = 0xA001;

const fn make_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const TABLE: [u16; 256] = make_table();

/// Advance a running CRC by one byte
#[inline]
pub fn update(crc: u16, byte: u8) -> u16 {
    (crc >> 8) ^ TABLE[((crc ^ byte as u16) & 0xFF) as usize]
}

/// Field checksum over `data` (seed 0, no final complement)
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &b| update(crc, b))
}

/// Name hash over raw bytes (seed 0xFFFF, complemented)
pub fn name_hash_bytes(name: &[u8]) -> u16 {
    !name.iter().fold(0xFFFF, |crc, &b| update(crc, b))
}

/// Name hash of a topic or key name
///
/// `const` so topic ids can be fixed at compile time.
pub const fn name_hash(name: &str) -> u16 {
    let bytes = name.as_bytes();
    let mut crc: u16 = 0xFFFF;
    let mut i = 0;
    while i < bytes.len() {
        crc = (crc >> 8) ^ TABLE[((crc ^ bytes[i] as u16) & 0xFF) as usize];
        i += 1;
    }
    !crc
}

/// Mesh partition key hash, or 0 when no key is configured
pub fn key_hash(key: Option<&str>) -> u32 {
    match key {
        Some(k) => crc32fast::hash(k.as_bytes()),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_checksum_matches_crc16_arc() {
        assert_eq!(checksum(CHECK), 0xBB3D);
    }

    #[test]
    fn test_name_hash_matches_crc16_usb() {
        assert_eq!(name_hash("123456789"), 0xB4C8);
        assert_eq!(name_hash_bytes(CHECK), 0xB4C8);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(name_hash(""), 0);
    }

    #[test]
    fn test_name_hash_usable_in_const() {
        const DEMO: u16 = name_hash("Demo");
        assert_eq!(DEMO, name_hash_bytes(b"Demo"));
        assert_ne!(DEMO, name_hash("demo"));
    }

    #[test]
    fn test_key_hash() {
        assert_eq!(key_hash(None), 0);
        assert_eq!(key_hash(Some("123456789")), 0xCBF4_3926);
    }

    proptest! {
        #[test]
        fn test_const_and_runtime_hash_agree(s in "\\PC{0,32}") {
            prop_assert_eq!(name_hash(&s), name_hash_bytes(s.as_bytes()));
        }

        #[test]
        fn test_single_bit_flip_changes_checksum(
            data in proptest::collection::vec(any::<u8>(), 1..64),
            bit in 0usize..512,
        ) {
            let mut flipped = data.clone();
            let bit = bit % (data.len() * 8);
            flipped[bit / 8] ^= 1 << (bit % 8);
            prop_assert_ne!(checksum(&data), checksum(&flipped));
        }
    }
}
