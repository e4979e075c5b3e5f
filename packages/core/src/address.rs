//! Tree addressing: path elements and path addresses.
//!
//! A management resource is identified by an ordered chain of `(key, value)`
//! segments from the root of the configuration tree, written
//! `/host=primary/server=web`. Addresses are plain values: cheap to clone,
//! hashable, and ordered structurally so traversals are deterministic.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Reserved element value that matches every child at one tree level.
///
/// Wildcards are legal only in read-only queries; every mutating tree
/// operation rejects addresses containing one.
pub const WILDCARD: &str = "*";

// ---------------------------------------------------------------------------
// PathElement
// ---------------------------------------------------------------------------

/// One `(key, value)` segment of a [`PathAddress`].
///
/// `key` names the resource type at that level (`host`, `server`), `value`
/// selects the instance within that type. Equality and ordering are
/// structural: key first, then value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathElement {
    key: String,
    value: String,
}

impl PathElement {
    /// Builds a segment from a type key and an instance value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Builds the wildcard segment for a type key.
    pub fn wildcard(key: impl Into<String>) -> Self {
        Self::new(key, WILDCARD)
    }

    /// The resource-type key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The instance value, possibly [`WILDCARD`].
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this segment matches every instance of its type.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }

    /// Whether `other` is this exact segment, or this segment is the
    /// wildcard for `other`'s key.
    #[must_use]
    pub fn matches(&self, other: &PathElement) -> bool {
        self.key == other.key && (self.is_wildcard() || self.value == other.value)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

// ---------------------------------------------------------------------------
// PathAddress
// ---------------------------------------------------------------------------

/// An immutable chain of [`PathElement`]s from the tree root to one node.
///
/// The empty chain addresses the root. Two addresses are equal iff their
/// element sequences are equal; ordering is lexicographic over segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathAddress {
    elements: Vec<PathElement>,
}

impl PathAddress {
    /// The root address, an empty segment chain.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds an address from a segment chain.
    #[must_use]
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self { elements }
    }

    /// Returns a new address with `element` appended.
    #[must_use]
    pub fn child(&self, element: PathElement) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element);
        Self { elements }
    }

    /// The address one level up, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.elements.is_empty() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// The final segment, or `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<&PathElement> {
        self.elements.last()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether this is the root address.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates the segments root-first.
    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.elements.iter()
    }

    /// Whether every leading segment of `other` equals this address.
    ///
    /// The root is a prefix of everything, including itself.
    #[must_use]
    pub fn is_prefix_of(&self, other: &PathAddress) -> bool {
        other.elements.len() >= self.elements.len()
            && self.elements.iter().zip(&other.elements).all(|(a, b)| a == b)
    }

    /// Whether any segment is the wildcard.
    #[must_use]
    pub fn is_multi_target(&self) -> bool {
        self.elements.iter().any(PathElement::is_wildcard)
    }
}

impl From<PathElement> for PathAddress {
    fn from(element: PathElement) -> Self {
        Self {
            elements: vec![element],
        }
    }
}

impl FromIterator<PathElement> for PathAddress {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PathAddress {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for PathAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return f.write_str("/");
        }
        for element in &self.elements {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

/// Failure parsing the `/key=value/...` string form of an address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The string did not begin with `/`.
    #[error("address must start with '/'")]
    MissingLeadingSlash,
    /// A segment was not `key=value` with both parts non-empty.
    #[error("segment `{0}` is not of the form key=value")]
    MalformedSegment(String),
}

impl FromStr for PathAddress {
    type Err = AddressParseError;

    /// Parses the display form: `/` is the root, otherwise one
    /// `/key=value` group per segment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(AddressParseError::MissingLeadingSlash);
        };
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let mut elements = Vec::new();
        for segment in rest.split('/') {
            let parsed = segment
                .split_once('=')
                .filter(|(key, value)| !key.is_empty() && !value.is_empty());
            match parsed {
                Some((key, value)) => elements.push(PathElement::new(key, value)),
                None => {
                    return Err(AddressParseError::MalformedSegment(segment.to_string()));
                }
            }
        }
        Ok(Self { elements })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn addr(pairs: &[(&str, &str)]) -> PathAddress {
        pairs
            .iter()
            .map(|(k, v)| PathElement::new(*k, *v))
            .collect()
    }

    // ---- Construction and accessors ----

    #[test]
    fn root_is_empty() {
        let root = PathAddress::root();
        assert!(root.is_empty());
        assert_eq!(root.len(), 0);
        assert_eq!(root.last(), None);
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn child_appends_without_mutating_parent() {
        let base = addr(&[("host", "a")]);
        let child = base.child(PathElement::new("server", "web"));
        assert_eq!(base.len(), 1);
        assert_eq!(child.len(), 2);
        assert_eq!(child.parent(), Some(base));
        assert_eq!(child.last().map(PathElement::value), Some("web"));
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(addr(&[("host", "a")]), addr(&[("host", "a")]));
        assert_ne!(addr(&[("host", "a")]), addr(&[("host", "b")]));
        assert_ne!(addr(&[("host", "a")]), addr(&[("server", "a")]));
    }

    #[test]
    fn ordering_is_structural() {
        let mut addresses = vec![
            addr(&[("host", "b")]),
            addr(&[("host", "a"), ("server", "web")]),
            addr(&[("host", "a")]),
        ];
        addresses.sort();
        assert_eq!(
            addresses,
            vec![
                addr(&[("host", "a")]),
                addr(&[("host", "a"), ("server", "web")]),
                addr(&[("host", "b")]),
            ]
        );
    }

    // ---- Wildcards ----

    #[test]
    fn wildcard_detection() {
        assert!(PathElement::wildcard("host").is_wildcard());
        assert!(!PathElement::new("host", "a").is_wildcard());
        assert!(addr(&[("host", "*")]).is_multi_target());
        assert!(!addr(&[("host", "a")]).is_multi_target());
    }

    #[test]
    fn wildcard_matches_any_instance_of_its_key() {
        let pattern = PathElement::wildcard("host");
        assert!(pattern.matches(&PathElement::new("host", "a")));
        assert!(pattern.matches(&PathElement::new("host", "b")));
        assert!(!pattern.matches(&PathElement::new("server", "a")));
        assert!(PathElement::new("host", "a").matches(&PathElement::new("host", "a")));
        assert!(!PathElement::new("host", "a").matches(&PathElement::new("host", "b")));
    }

    // ---- Prefix relation ----

    #[test]
    fn root_is_prefix_of_everything() {
        let root = PathAddress::root();
        assert!(root.is_prefix_of(&root));
        assert!(root.is_prefix_of(&addr(&[("host", "a")])));
    }

    #[test]
    fn prefix_requires_matching_leading_segments() {
        let host = addr(&[("host", "a")]);
        let server = addr(&[("host", "a"), ("server", "web")]);
        assert!(host.is_prefix_of(&server));
        assert!(!server.is_prefix_of(&host));
        assert!(host.is_prefix_of(&host));
        assert!(!addr(&[("host", "b")]).is_prefix_of(&server));
    }

    // ---- String form ----

    #[test]
    fn display_forms() {
        assert_eq!(PathAddress::root().to_string(), "/");
        assert_eq!(
            addr(&[("host", "a"), ("server", "web")]).to_string(),
            "/host=a/server=web"
        );
    }

    #[test]
    fn parse_root_and_segments() {
        assert_eq!("/".parse::<PathAddress>(), Ok(PathAddress::root()));
        assert_eq!(
            "/host=a/server=web".parse::<PathAddress>(),
            Ok(addr(&[("host", "a"), ("server", "web")]))
        );
    }

    #[test]
    fn parse_rejects_missing_slash() {
        assert_eq!(
            "host=a".parse::<PathAddress>(),
            Err(AddressParseError::MissingLeadingSlash)
        );
    }

    #[test]
    fn parse_rejects_malformed_segments() {
        for bad in ["/host", "/host=", "/=a", "/host=a/", "//host=a"] {
            assert!(
                matches!(
                    bad.parse::<PathAddress>(),
                    Err(AddressParseError::MalformedSegment(_))
                ),
                "expected malformed-segment error for {bad:?}"
            );
        }
    }

    proptest! {
        #[test]
        fn display_parse_round_trip(
            segments in proptest::collection::vec(
                ("[a-z][a-z0-9-]{0,8}", "[a-z*][a-z0-9-]{0,8}"),
                0..5,
            )
        ) {
            let address: PathAddress = segments
                .iter()
                .map(|(k, v)| PathElement::new(k.clone(), v.clone()))
                .collect();
            let reparsed: PathAddress = address.to_string().parse().unwrap();
            prop_assert_eq!(reparsed, address);
        }
    }
}
