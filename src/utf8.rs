//! Case folding for name lookups.

use core::cmp::Ordering;

/// Compare `a` and `b` ignoring case.
///
/// Folding covers ASCII, Latin-1 Supplement and Latin Extended-A/B
/// (U+0000 to U+024F). Characters outside that range compare by code point,
/// which orders the same as their UTF-8 bytes.
pub fn casecmp(a: &str, b: &str) -> Ordering {
    if a.is_ascii() && b.is_ascii() {
        return a
            .bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()));
    }
    a.chars().map(fold).cmp(b.chars().map(fold))
}

const LAST_FOLDED: char = '\u{24f}';

fn fold(c: char) -> char {
    if c > LAST_FOLDED {
        return c;
    }
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Compare names, folding case only when asked to.
pub(crate) fn names_equal(a: &str, b: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        casecmp(a, b) == Ordering::Equal
    } else {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert_eq!(casecmp("Hello", "hELLO"), Ordering::Equal);
        assert_eq!(casecmp("abc", "abd"), Ordering::Less);
        assert_eq!(casecmp("abcd", "ABC"), Ordering::Greater);
    }

    #[test]
    fn latin_1_supplement() {
        assert_eq!(casecmp("ÀÉÎÕÜ", "àéîõü"), Ordering::Equal);
        assert_eq!(casecmp("Ærøskøbing", "ÆRØSKØBING"), Ordering::Equal);
    }

    #[test]
    fn latin_extended() {
        // Extended-A
        assert_eq!(casecmp("ĀĂĄĆŁŃ", "āăąćłń"), Ordering::Equal);
        // Extended-B
        assert_eq!(casecmp("ƁƇǍǏ", "ɓƈǎǐ"), Ordering::Equal);
    }

    #[test]
    fn other_scripts_compare_bytewise() {
        assert_ne!(casecmp("Д", "д"), Ordering::Equal);
        assert_ne!(casecmp("Σ", "σ"), Ordering::Equal);
        assert_eq!(casecmp("Д", "д"), "Д".cmp("д"));
        assert_eq!(casecmp("Ключ", "ключ"), Ordering::Less);
    }

    #[test]
    fn mismatch_is_not_folded_away() {
        assert_ne!(casecmp("é", "e"), Ordering::Equal);
        assert!(!names_equal("Key", "key", false));
        assert!(names_equal("Key", "key", true));
    }
}
