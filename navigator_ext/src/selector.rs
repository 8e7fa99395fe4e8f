//! Document coverage predicates.
//!
//! A selector decides which open files are routed to the language session.
//! No protocol semantics live here; this is configuration surface only.

use serde::{Deserialize, Serialize};

/// A (scheme, language-id) pair the session covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentSelector {
    pub scheme: String,
    pub language: String,
}

impl DocumentSelector {
    pub fn new(scheme: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            language: language.into(),
        }
    }

    /// Returns true if the selector covers the given document.
    pub fn matches(&self, scheme: &str, language: &str) -> bool {
        self.scheme == scheme && self.language == language
    }
}

/// The languages an FFI navigator session covers: Python frontends and the
/// C/C++ side of the FFI boundary, plus plaintext.
pub fn document_selectors() -> Vec<DocumentSelector> {
    ["python", "c", "cpp", "plaintext"]
        .into_iter()
        .map(|language| DocumentSelector::new("file", language))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_scheme_and_language() {
        let selector = DocumentSelector::new("file", "python");
        assert!(selector.matches("file", "python"));
        assert!(!selector.matches("untitled", "python"));
        assert!(!selector.matches("file", "rust"));
    }

    #[test]
    fn covers_both_sides_of_the_ffi_boundary() {
        let selectors = document_selectors();
        assert_eq!(selectors.len(), 4);
        for language in ["python", "c", "cpp", "plaintext"] {
            assert!(selectors.iter().any(|s| s.matches("file", language)));
        }
    }
}
