//! URL slug derivation

/// Derive a URL-safe slug from a title.
///
/// Lowercases, drops everything except ASCII letters, digits, whitespace
/// and hyphens, collapses whitespace/hyphen runs into a single hyphen and
/// trims leading/trailing hyphens.
///
/// ```
/// use catalog_common::to_slug;
///
/// assert_eq!(to_slug("Hello, World!"), "hello-world");
/// assert_eq!(to_slug("  Rust -- for   everyone "), "rust-for-everyone");
/// ```
pub fn to_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_separator = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_basic() {
        assert_eq!(to_slug("Wireless Headphones"), "wireless-headphones");
    }

    #[test]
    fn test_slug_strips_punctuation() {
        assert_eq!(to_slug("C++ & Rust: a tale"), "c-rust-a-tale");
    }

    #[test]
    fn test_slug_collapses_separators() {
        assert_eq!(to_slug("a  - -  b"), "a-b");
    }

    #[test]
    fn test_slug_trims_edges() {
        assert_eq!(to_slug("-- edge --"), "edge");
    }

    #[test]
    fn test_slug_non_ascii_dropped() {
        assert_eq!(to_slug("Café Olé"), "caf-ol");
    }

    #[test]
    fn test_slug_empty() {
        assert_eq!(to_slug("   "), "");
    }
}
