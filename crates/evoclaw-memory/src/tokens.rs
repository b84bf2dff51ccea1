//! Conservative, rune-based token estimation.
//!
//! Never underestimates relative to a naive `bytes/4` estimate on code-like
//! (ASCII) input, and charges one token per non-ASCII scalar value so
//! multi-byte scripts (CJK, Cyrillic, etc.) aren't wildly undercounted the
//! way a byte-length heuristic would undercount them.

pub fn estimate_tokens(content: &str) -> usize {
    if content.is_empty() {
        return 0;
    }
    let mut ascii_runes = 0usize;
    let mut wide_runes = 0usize;
    for ch in content.chars() {
        if ch.is_ascii() {
            ascii_runes += 1;
        } else {
            wide_runes += 1;
        }
    }
    let ascii_tokens = ascii_runes.div_ceil(4);
    ascii_tokens + wide_runes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn ascii_is_at_least_bytes_over_four() {
        let s = "fn main() { println!(\"hi\"); }";
        let naive = s.len().div_ceil(4);
        assert!(estimate_tokens(s) >= naive);
    }

    #[test]
    fn cjk_is_roughly_one_token_per_character() {
        let s = "你好世界你好世界"; // 8 CJK characters
        assert_eq!(estimate_tokens(s), 8);
    }

    #[test]
    fn mixed_script_sums_both_parts() {
        let s = "abcd你好"; // 4 ascii -> 1 token, 2 wide -> 2 tokens
        assert_eq!(estimate_tokens(s), 3);
    }
}
