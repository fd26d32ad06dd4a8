//! Hierarchical NDN names.
//!
//! A small, dependency-free stand-in for the real TLV name codec, which
//! lives outside this crate's scope.
//! It only exposes what the rest of the system needs -- component access,
//! prefix tests, and ordering -- not a wire format.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A single, opaque name component.
///
/// Components compare byte-wise (NDN's canonical ordering), which is what
/// makes `Name` usable as a `BTreeMap` key in [`crate::cache`] and
/// [`crate::trust_anchor`].
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Component(Arc<[u8]>);

impl Component {
    /// Creates a component from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Component(Arc::from(bytes.into().into_boxed_slice()))
    }

    /// Creates a component from a UTF-8 string (the common case in tests
    /// and examples).
    pub fn from_str(s: &str) -> Self {
        Component::new(s.as_bytes().to_vec())
    }

    /// The raw bytes of this component.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "%{}", hex(&self.0)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl From<&str> for Component {
    fn from(s: &str) -> Self {
        Component::from_str(s)
    }
}

/// An ordered, hashable, prefix-testable NDN name.
///
/// `Name` implements `Ord` component-wise (shorter names sort before their
/// extensions, matching NDN's canonical name ordering), which is what lets
/// [`crate::cache::CertificateCache`] and
/// [`crate::trust_anchor::TrustAnchorContainer`] use a `BTreeMap` and do
/// "ceiling" lookups.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
pub struct Name(Vec<Component>);

impl Name {
    /// The empty name `/`.
    pub fn root() -> Self {
        Name(Vec::new())
    }

    /// Parses a `/`-delimited name, e.g. `/root/user/KEY/1/self/1`.
    ///
    /// This is a convenience constructor for tests and for programmatic
    /// construction of names; it is not a TLV decoder.
    pub fn parse(s: &str) -> Self {
        let comps = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(Component::from_str)
            .collect();
        Name(comps)
    }

    /// Appends a component, returning a new name.
    pub fn append(&self, component: impl Into<Component>) -> Self {
        let mut v = self.0.clone();
        v.push(component.into());
        Name(v)
    }

    /// The number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this name has zero components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The component at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    /// Negative-indexed component access: `at(-1)` is the last component.
    ///
    /// Returns `None` if `|n| > len()`.
    pub fn at(&self, n: isize) -> Option<&Component> {
        if n >= 0 {
            self.0.get(n as usize)
        } else {
            let idx = self.0.len() as isize + n;
            if idx < 0 { None } else { self.0.get(idx as usize) }
        }
    }

    /// Returns the prefix consisting of the first `n` components (`n >= 0`)
    /// or all but the last `-n` components (`n < 0`).
    pub fn prefix(&self, n: isize) -> Name {
        let len = self.0.len() as isize;
        let take = if n >= 0 { n.min(len) } else { (len + n).max(0) };
        Name(self.0[..take as usize].to_vec())
    }

    /// Whether `self` is a prefix of `other` (a name is a prefix of
    /// itself).
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Whether `self` is a strict (proper) prefix of `other`.
    pub fn is_strict_prefix_of(&self, other: &Name) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Iterates over components.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.0.iter()
    }

    /// Whether the last component looks like an implicit SHA-256 digest
    /// component (NDN convention: a 32-byte component tagged as such).
    ///
    /// Since this crate does not implement the TLV type-length framing,
    /// this is approximated by "last component is exactly 32 bytes",
    /// matching the only shape the digest convention produces.
    pub fn ends_in_implicit_digest(&self) -> bool {
        self.0.last().map(|c| c.as_bytes().len() == 32).unwrap_or(false)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for c in &self.0 {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Name) -> Ordering {
        // NDN canonical order: component-wise comparison, shorter prefix
        // sorts first when one name is a prefix of the other.
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Name) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_negative_index() {
        let n = Name::parse("/a/KEY/k1/issuer/1");
        assert_eq!(n.len(), 5);
        assert_eq!(n.at(-1).unwrap().to_string(), "1");
        assert_eq!(n.at(-2).unwrap().to_string(), "issuer");
        assert_eq!(n.at(-3).unwrap().to_string(), "k1");
        assert_eq!(n.prefix(-4).to_string(), "/a");
        assert_eq!(n.prefix(-3).to_string(), "/a/KEY");
        assert_eq!(n.prefix(-2).to_string(), "/a/KEY/k1");
    }

    #[test]
    fn is_prefix_of() {
        let a = Name::parse("/a/b");
        let b = Name::parse("/a/b/c");
        assert!(a.is_prefix_of(&b));
        assert!(a.is_prefix_of(&a));
        assert!(!b.is_prefix_of(&a));
        assert!(a.is_strict_prefix_of(&b));
        assert!(!a.is_strict_prefix_of(&a));
    }

    #[test]
    fn ordering_matches_prefix_semantics() {
        let a = Name::parse("/a");
        let ab = Name::parse("/a/b");
        let ac = Name::parse("/a/c");
        assert!(a < ab);
        assert!(ab < ac);
    }
}
