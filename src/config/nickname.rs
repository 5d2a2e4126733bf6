//! Nickname generation.
//!
//! Default nicknames look like `EchoOwl42`; fallbacks for a taken nick keep
//! as much of the original as fits in nine characters and add two digits.

use rand::RngExt;

const PREFIXES: &[&str] = &[
    "Echo", "Tide", "Wire", "Hop", "Link", "Pipe", "Loop", "Ping", "Wave", "Sync",
];

const ANIMALS: &[&str] = &["Owl", "Fox", "Eel", "Yak", "Ant", "Emu", "Gnu", "Bat", "Elk", "Cod"];

/// Longest nick RFC 1459 servers are guaranteed to accept.
const MAX_NICK_LEN: usize = 9;

/// Generate a random nickname such as `EchoOwl42`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let prefix = PREFIXES[rng.random_range(0..PREFIXES.len())];
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("{}{}{}", prefix, animal, num)
}

/// Alternative for `base` after the server answered 433 (nickname in use).
///
/// The first attempt appends `_`; later attempts replace the tail with two
/// random digits.
pub fn fallback_nickname(base: &str, attempt: u32) -> String {
    if attempt <= 1 && base.chars().count() < MAX_NICK_LEN {
        return format!("{}_", base);
    }
    let stem: String = base.chars().take(MAX_NICK_LEN - 2).collect();
    let num: u8 = rand::rng().random_range(10..100);
    format!("{}{}", stem, num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_nick_fits_limit() {
        for _ in 0..50 {
            let nick = generate_nickname();
            assert!(!nick.is_empty());
            assert!(nick.len() <= MAX_NICK_LEN, "{nick}");
            assert!(nick.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_fallback_nickname() {
        assert_eq!(fallback_nickname("relay", 1), "relay_");
        let nick = fallback_nickname("relay", 2);
        assert!(nick.starts_with("relay") && nick.len() == 7, "{nick}");
        let nick = fallback_nickname("averylongnick", 1);
        assert!(nick.starts_with("averylo") && nick.len() == 9, "{nick}");
    }
}
