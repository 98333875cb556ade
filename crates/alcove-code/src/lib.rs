//! Room code generation.
//!
//! The code is the only credential a room has, so it must come from the OS
//! CSPRNG and carry enough entropy that guessing is hopeless. The alphabet
//! drops `0`/`O` and `1`/`I` so codes survive being read aloud or typed.

use rand_core::{OsRng, RngCore};

/// 32 symbols — no `0`, `O`, `1`, `I`.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// 8 chars over a 32-symbol alphabet is exactly 40 bits.
pub const CODE_LEN: usize = 8;

/// Bits of entropy in a code of the given length. log2(32) = 5.
pub const fn entropy_bits(len: usize) -> usize {
    len * 5
}

/// Draw a fresh random code of `len` characters.
///
/// Each byte maps to `ALPHABET[b & 31]`; 32 divides 256, so the mapping is
/// unbiased and no rejection loop is needed.
pub fn generate(len: usize) -> String {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf.iter()
        .map(|b| ALPHABET[(b & 31) as usize] as char)
        .collect()
}

/// Length and alphabet membership only — says nothing about whether a live
/// room is behind the code.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_are_distinct_and_well_formed() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let code = generate(CODE_LEN);
            assert!(is_well_formed(&code), "bad code: {code}");
            assert!(seen.insert(code), "duplicate code drawn");
        }
    }

    #[test]
    fn entropy_target() {
        assert!(entropy_bits(CODE_LEN) >= 40);
    }

    #[test]
    fn alphabet_has_no_ambiguous_symbols() {
        assert_eq!(ALPHABET.len(), 32);
        for c in [b'0', b'O', b'1', b'I', b'l'] {
            assert!(!ALPHABET.contains(&c));
        }
    }

    #[test]
    fn well_formedness_rejects_bad_input() {
        assert!(!is_well_formed("SHORT"));
        assert!(!is_well_formed("ABCDEFGH2")); // too long
        assert!(!is_well_formed("ABCDEFG0")); // excluded symbol
        assert!(!is_well_formed("abcdefgh")); // lowercase not in alphabet
        assert!(is_well_formed("ABCDEFGH"));
    }
}
