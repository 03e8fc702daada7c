//! 64-bit path fingerprint compatible with the host engine's archive hash.
//!
//! This is not a general-purpose hash. The layout below must stay
//! bit-for-bit identical to the host's own file addressing:
//!
//! ```text
//! high 32 bits: fold(root[1..len-2]) + fold(ext)        (wrapping)
//! low  32 bits: root[0] << 24 | len(root) as u8 << 16
//!             | root[len-2] << 8 | root[len-1] | ext bits
//! ```
//!
//! where `root`/`ext` split the canonical path at its last `.`.

/// Fingerprint of a canonical path
pub type Fingerprint = u64;

const FOLD_MULTIPLIER: u32 = 0x1003F;

/// Extension bits OR-ed into the low word
const EXTENSION_BITS: &[(&[u8], u32)] = &[
    (b".kf", 0x80),
    (b".nif", 0x8000),
    (b".dds", 0x8080),
    (b".wav", 0x8000_0000),
];

#[inline]
fn fold(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| {
        acc.wrapping_mul(FOLD_MULTIPLIER).wrapping_add(u32::from(b))
    })
}

/// Compute the fingerprint of an already-canonical path.
///
/// Callers normalize first; hashing a raw path gives a different value.
pub fn fingerprint(canonical: &str) -> Fingerprint {
    let bytes = canonical.as_bytes();
    let (root, ext) = match bytes.iter().rposition(|&b| b == b'.') {
        Some(dot) => bytes.split_at(dot),
        None => (bytes, &[][..]),
    };

    let mut low = 0u32;
    if let (Some(&first), Some(&last)) = (root.first(), root.last()) {
        low = u32::from(last);
        if root.len() > 2 {
            low |= u32::from(root[root.len() - 2]) << 8;
        }
        // Length is an 8-bit field; longer roots truncate
        low |= u32::from(root.len() as u8) << 16;
        low |= u32::from(first) << 24;
    }

    if let Some((_, bits)) = EXTENSION_BITS.iter().find(|(e, _)| *e == ext) {
        low |= bits;
    }

    let mid = if root.len() > 2 {
        fold(&root[1..root.len() - 2])
    } else {
        0
    };
    let high = mid.wrapping_add(fold(ext));

    (u64::from(high) << 32) | u64::from(low)
}
