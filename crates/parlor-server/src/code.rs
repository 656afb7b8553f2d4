use rand::Rng;

/// Uppercase letters and digits minus the visually ambiguous I, O, 0, 1.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 4;

/// Generate a 4-character room code. Uniqueness is not guaranteed here;
/// the caller must re-roll on collision against its live code index.
pub fn generate(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
