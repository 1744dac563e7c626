//! Slug derivation for proposals and maintenance items.

use crate::core::error::SpecdeckError;

/// Lowercase, collapse every run of non-alphanumerics into one `-`, trim
/// leading/trailing `-`. An empty result is an [`SpecdeckError::InvalidSlug`].
pub fn slugify(name: &str) -> Result<String, SpecdeckError> {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        return Err(SpecdeckError::InvalidSlug(name.to_string()));
    }
    Ok(out)
}

/// True when `s` is already in normalized form.
pub fn is_slug(s: &str) -> bool {
    slugify(s).map(|n| n == s).unwrap_or(false)
}

/// Accept only normalized slugs. Every caller-supplied slug passes through
/// here before it is joined onto a workspace path.
pub fn require_slug(s: &str) -> Result<&str, SpecdeckError> {
    if is_slug(s) {
        Ok(s)
    } else {
        Err(SpecdeckError::InvalidSlug(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_names() {
        assert_eq!(slugify("Add OAuth Login").unwrap(), "add-oauth-login");
        assert_eq!(slugify("  --Rate   limiting!! v2--").unwrap(), "rate-limiting-v2");
        assert_eq!(slugify("auth").unwrap(), "auth");
        assert_eq!(slugify("a__b..c").unwrap(), "a-b-c");
    }

    #[test]
    fn non_ascii_letters_are_separators() {
        assert_eq!(slugify("café déjà").unwrap(), "caf-d-j");
    }

    #[test]
    fn empty_after_normalization_is_invalid() {
        assert!(matches!(slugify("!!!"), Err(SpecdeckError::InvalidSlug(_))));
        assert!(matches!(slugify(""), Err(SpecdeckError::InvalidSlug(_))));
    }

    #[test]
    fn is_slug_checks_fixed_point() {
        assert!(is_slug("add-oauth"));
        assert!(!is_slug("Add OAuth"));
        assert!(!is_slug("-x"));
    }

    #[test]
    fn require_slug_rejects_path_like_input() {
        for bad in ["", "..", ".", "a/b", "../specs/x", "A"] {
            assert!(
                matches!(require_slug(bad), Err(SpecdeckError::InvalidSlug(_))),
                "{bad:?} accepted"
            );
        }
        assert_eq!(require_slug("add-auth").unwrap(), "add-auth");
    }
}
