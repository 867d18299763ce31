//! Import specifier parsing.
//!
//! Splits a raw specifier into the package identity (`foo`, `@scope/foo`)
//! and the internal subpath (`""` or `"/..."`). Parsing is total: malformed
//! input is split the same way and simply fails to match any alias later.

use std::borrow::Cow;

/// A specifier split into package identity and internal subpath.
///
/// `identity` followed by `subpath` always reproduces the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specifier<'a> {
    /// `foo` or `@scope/foo`.
    pub identity: &'a str,
    /// Empty for a root import, otherwise starts with `/`.
    pub subpath: &'a str,
}

impl<'a> Specifier<'a> {
    /// Parse a specifier. See [`parse`].
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        parse(raw)
    }

    /// Whether this is a root import (no subpath).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.subpath.is_empty()
    }

    /// The export map key for this subpath: `.` or `./sub`.
    #[must_use]
    pub fn export_key(&self) -> Cow<'a, str> {
        export_key(self.subpath)
    }
}

impl std::fmt::Display for Specifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.identity, self.subpath)
    }
}

/// Split `raw` into package identity and internal subpath.
///
/// The split point is the first `/`, or the second one when the specifier
/// starts with `@`. Without a qualifying `/` the whole string is the identity.
#[must_use]
pub fn parse(raw: &str) -> Specifier<'_> {
    let first = raw.find('/');
    let split = if raw.starts_with('@') {
        first.and_then(|i| raw[i + 1..].find('/').map(|j| i + 1 + j))
    } else {
        first
    };

    match split {
        Some(at) => Specifier {
            identity: &raw[..at],
            subpath: &raw[at..],
        },
        None => Specifier {
            identity: raw,
            subpath: "",
        },
    }
}

/// Map an internal subpath to its export map key.
#[must_use]
pub fn export_key(subpath: &str) -> Cow<'_, str> {
    if subpath.is_empty() {
        Cow::Borrowed(".")
    } else {
        Cow::Owned(format!(".{subpath}"))
    }
}

/// Whether a specifier is relative (`./`, `../`).
#[must_use]
pub fn is_relative(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../") || spec == "." || spec == ".."
}
