// Qualified symbols: the unit of late binding.

use crate::error::{LiveError, LiveResult};
use std::fmt;
use std::str::FromStr;

/// A `namespace/name` pair naming a binding in a loader.
///
/// Only the first `/` separates the two parts, so `a.b/c/d` names the
/// binding `c/d` in namespace `a.b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedSymbol {
    namespace: String,
    name: String,
}

impl QualifiedSymbol {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> LiveResult<Self> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() || name.is_empty() {
            return Err(LiveError::InvalidSymbol(format!("{}/{}", namespace, name)));
        }
        Ok(QualifiedSymbol { namespace, name })
    }

    /// Split `ns/name` into its parts.
    pub fn parse(qualified_name: &str) -> LiveResult<Self> {
        match qualified_name.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(QualifiedSymbol {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(LiveError::InvalidSymbol(qualified_name.to_string())),
        }
    }

    /// True when `parse` would accept `name`.
    pub fn is_qualified(name: &str) -> bool {
        Self::parse(name).is_ok()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for QualifiedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for QualifiedSymbol {
    type Err = LiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualifiedSymbol::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_first_slash() {
        let sym = QualifiedSymbol::parse("my.session/write-point").unwrap();
        assert_eq!(sym.namespace(), "my.session");
        assert_eq!(sym.name(), "write-point");

        let nested = QualifiedSymbol::parse("a.b/c/d").unwrap();
        assert_eq!(nested.namespace(), "a.b");
        assert_eq!(nested.name(), "c/d");
        assert_eq!(nested.to_string(), "a.b/c/d");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for bad in ["", "/", "no_slash", "/starts_with_slash", "ends_with_slash/"] {
            assert_eq!(
                QualifiedSymbol::parse(bad),
                Err(LiveError::InvalidSymbol(bad.to_string())),
                "{} should not parse",
                bad
            );
        }
    }

    #[test]
    fn test_is_qualified_agrees_with_parse() {
        for name in [
            "/", "", "no_slash", "ends_with_slash/", "/starts", "a//", "a/b/c", "module/symbol",
            "my.module/function",
        ] {
            assert_eq!(
                QualifiedSymbol::is_qualified(name),
                QualifiedSymbol::parse(name).is_ok(),
                "{:?}",
                name
            );
        }
        assert!(QualifiedSymbol::is_qualified("my.module/function"));
        assert!(!QualifiedSymbol::is_qualified("ends_with_slash/"));
    }

    #[test]
    fn test_new_rejects_empty_parts() {
        assert!(QualifiedSymbol::new("", "x").is_err());
        assert!(QualifiedSymbol::new("ns", "").is_err());
        assert_eq!(
            "ns/x".parse::<QualifiedSymbol>().unwrap(),
            QualifiedSymbol::new("ns", "x").unwrap()
        );
    }
}
