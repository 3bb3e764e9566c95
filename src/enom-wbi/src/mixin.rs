/// Permutation applied to `img_key + sub_key` to build the mixin key.
pub const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

const MIXIN_KEY_LEN: usize = 32;

/// Shuffle the concatenated keys through [`MIXIN_KEY_ENC_TAB`] and keep the
/// first 32 characters.
///
/// Table entries pointing past the end of a short input are skipped.
pub fn mixin_key(orig: &str) -> String {
    let chars: Vec<char> = orig.chars().collect();
    MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&n| chars.get(n))
        .take(MIXIN_KEY_LEN)
        .collect()
}
