//! Wildcard matching for `pat(...)` condition functions.
//!
//! Only `*` is special; every other character, including `?`, `[` and `\`,
//! matches itself literally. Group and endpoint names routinely contain
//! characters that glob implementations would interpret (e.g. "api-(v1)"),
//! so a dedicated matcher is used instead of a full glob crate.

/// Returns whether `s` matches `pattern`, where `*` matches any sequence of
/// characters (including none).
///
/// ```
/// use upwatch_common::pattern::matches;
///
/// assert!(matches("*ing*", "livingroom"));
/// assert!(matches("living*room_*3", "livingroom_123"));
/// assert!(!matches("what", "livingroom_123"));
/// ```
pub fn matches(pattern: &str, s: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    deep_match(
        &s.chars().collect::<Vec<_>>(),
        &pattern.chars().collect::<Vec<_>>(),
    )
}

fn deep_match(mut s: &[char], mut pattern: &[char]) -> bool {
    while let Some(&p) = pattern.first() {
        if p == '*' {
            return deep_match(s, &pattern[1..])
                || (!s.is_empty() && deep_match(&s[1..], pattern));
        }
        match s.first() {
            Some(&c) if c == p => {}
            _ => return false,
        }
        s = &s[1..];
        pattern = &pattern[1..];
    }
    s.is_empty() && pattern.is_empty()
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn matching_patterns() {
        for pattern in [
            "*",
            "**",
            "living*",
            "*living*",
            "*123",
            "*_*",
            "living*_*3",
            "living*room_*3",
            "*vin*om*2*",
            "livingroom_123",
            "*livingroom_123*",
        ] {
            assert!(matches(pattern, "livingroom_123"), "pattern '{pattern}' should match");
        }
    }

    #[test]
    fn non_matching_patterns() {
        for pattern in [
            "livingroom",
            "livingroom123",
            "what",
            "*what*",
            "*.*",
            "room*123",
        ] {
            assert!(!matches(pattern, "livingroom_123"), "pattern '{pattern}' should not match");
        }
    }

    #[test]
    fn backslash_is_literal() {
        assert!(matches("*test*", "\\test"));
    }
}
