//! Composite key handling.
//!
//! Records live in a flat key space. A namespace partitions it by prefixing
//! the key with `"<namespace>/"`.

use crate::error::StoreError;

pub(crate) const SEPARATOR: char = '/';

/// Build the composite key for `ns` and `key`.
///
/// Both parts are trimmed; an empty key, or an empty namespace when one is
/// given, is rejected.
pub(crate) fn composite_key(ns: Option<&str>, key: &str) -> Result<String, StoreError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(StoreError::InvalidKey("can't be empty string".to_owned()));
    }

    match ns {
        None => Ok(key.to_owned()),
        Some(ns) => {
            let ns = namespace_part(ns)?;
            let mut composite = String::with_capacity(ns.len() + 1 + key.len());
            composite.push_str(ns);
            composite.push(SEPARATOR);
            composite.push_str(key);
            Ok(composite)
        }
    }
}

/// Prefix that every composite key in `ns` starts with.
pub(crate) fn namespace_prefix(ns: Option<&str>) -> Result<String, StoreError> {
    match ns {
        None => Ok(String::new()),
        Some(ns) => {
            let ns = namespace_part(ns)?;
            Ok(format!("{ns}{SEPARATOR}"))
        }
    }
}

/// Validate an optional key prefix used when listing entries.
pub(crate) fn entry_prefix(prefix: Option<&str>) -> Result<Option<&str>, StoreError> {
    match prefix {
        None => Ok(None),
        Some(p) => {
            let p = p.trim();
            if p.is_empty() {
                return Err(StoreError::InvalidPrefix("empty string".to_owned()));
            }
            Ok(Some(p))
        }
    }
}

fn namespace_part(ns: &str) -> Result<&str, StoreError> {
    let ns = ns.trim();
    if ns.is_empty() {
        return Err(StoreError::InvalidNamespace(
            "can't be empty string".to_owned(),
        ));
    }
    Ok(ns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_namespace_and_key() {
        assert_eq!(composite_key(Some("bench"), "abc").unwrap(), "bench/abc");
        assert_eq!(composite_key(Some("  bench "), " abc ").unwrap(), "bench/abc");
        assert_eq!(composite_key(None, "abc").unwrap(), "abc");
    }

    #[test]
    fn rejects_blank_parts() {
        assert!(matches!(
            composite_key(Some("   "), "abc"),
            Err(StoreError::InvalidNamespace(_))
        ));
        assert!(matches!(
            composite_key(Some("bench"), "  "),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            entry_prefix(Some(" ")),
            Err(StoreError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn namespace_prefix_includes_separator() {
        assert_eq!(namespace_prefix(Some("ns")).unwrap(), "ns/");
        assert_eq!(namespace_prefix(None).unwrap(), "");
    }
}
