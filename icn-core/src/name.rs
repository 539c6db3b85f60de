use std::fmt;

use serde::{Deserialize, Serialize};

/// Hierarchical name made of opaque byte components.
///
/// Names compare componentwise, so the derived ordering is the lexicographic
/// order over the component sequence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Vec<u8>>,
}

impl Name {
    /// Create a new empty name
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn from_components(components: Vec<Vec<u8>>) -> Self {
        Self { components }
    }

    /// Parse a name from its URI form (e.g. "/hello/world").
    ///
    /// Empty parts (`//`) are skipped and the leading '/' is optional.
    /// `%XX` escapes produced by `Display` are decoded; malformed escapes
    /// are kept verbatim. A part made of three or more periods loses three
    /// of them, so `...` is the empty component.
    pub fn from_str(path: &str) -> Self {
        let components = path
            .split('/')
            .filter(|part| !part.is_empty())
            .map(decode_component)
            .collect();
        Self { components }
    }

    /// Append a component to the name
    pub fn append(&mut self, component: Vec<u8>) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Append a string component to the name
    pub fn append_str(&mut self, component: &str) -> &mut Self {
        self.components.push(component.as_bytes().to_vec());
        self
    }

    /// Concatenate two names into a new one.
    pub fn join(&self, suffix: &Name) -> Name {
        let mut components = self.components.clone();
        components.extend(suffix.components.iter().cloned());
        Name { components }
    }

    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    /// Get the number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.components.get(index).map(Vec::as_slice)
    }

    /// Check if this name is a prefix of another name
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.len() <= other.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    /// Get a prefix of this name with at most `length` components
    pub fn get_prefix(&self, length: usize) -> Name {
        let end = length.min(self.components.len());
        Name {
            components: self.components[..end].to_vec(),
        }
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut uri = String::new();
        for component in &self.components {
            uri.push('/');
            encode_component(component, &mut uri);
        }
        uri
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl From<&str> for Name {
    fn from(path: &str) -> Self {
        Name::from_str(path)
    }
}

fn is_all_periods(bytes: &[u8]) -> bool {
    bytes.iter().all(|&byte| byte == b'.')
}

fn encode_component(component: &[u8], out: &mut String) {
    // "", "." and ".." cannot be written as-is, so every all-period
    // component gets three extra periods
    if is_all_periods(component) {
        out.push_str("...");
    }
    for &byte in component {
        if byte.is_ascii_graphic() && byte != b'/' && byte != b'%' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
}

fn decode_component(part: &str) -> Vec<u8> {
    let bytes = part.as_bytes();
    if bytes.len() >= 3 && is_all_periods(bytes) {
        return bytes[3..].to_vec();
    }
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    decoded
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_creation() {
        let name = Name::from_str("/hello/world");
        assert_eq!(name.len(), 2);
        assert_eq!(name.get(0), Some(&b"hello"[..]));
        assert_eq!(name.get(1), Some(&b"world"[..]));
        assert_eq!(name.to_string(), "/hello/world");
    }

    #[test]
    fn test_empty_name() {
        let name = Name::from_str("/");
        assert!(name.is_empty());
        assert_eq!(name.to_string(), "/");
        assert_eq!(Name::from_str(""), Name::new());
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(Name::from_str("hello/world"), Name::from_str("/hello/world"));
        assert_eq!(Name::from_str("//hello///world/"), Name::from_str("/hello/world"));
    }

    #[test]
    fn test_name_prefix() {
        let name = Name::from_str("/hello/world/test");
        let prefix = name.get_prefix(2);
        assert_eq!(prefix.to_string(), "/hello/world");
        assert!(prefix.is_prefix_of(&name));
        assert!(!name.is_prefix_of(&prefix));
        assert!(Name::new().is_prefix_of(&name));
        assert_eq!(name.get_prefix(10), name);
    }

    #[test]
    fn test_prefix_is_componentwise() {
        // "/ab" is not a prefix of "/abc" even though the strings are
        let short = Name::from_str("/ab");
        let long = Name::from_str("/abc/d");
        assert!(!short.is_prefix_of(&long));
    }

    #[test]
    fn test_join() {
        let base = Name::from_str("/a/b");
        let joined = base.join(&Name::from_str("/c"));
        assert_eq!(joined.to_string(), "/a/b/c");
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_ordering_by_components() {
        let mut names = vec![
            Name::from_str("/b"),
            Name::from_str("/a/z"),
            Name::from_str("/a"),
        ];
        names.sort();
        let uris: Vec<String> = names.iter().map(Name::to_uri).collect();
        assert_eq!(uris, vec!["/a", "/a/z", "/b"]);
    }

    #[test]
    fn test_uri_roundtrip() {
        for uri in ["/test/data", "/a", "/sensor/room-1/temp_2"] {
            let name = Name::from_str(uri);
            assert_eq!(Name::from_str(&name.to_string()), name);
        }
    }

    #[test]
    fn test_binary_components_are_escaped() {
        let mut name = Name::new();
        name.append(vec![0x00, b'/', b'%', 0xff]).append_str("ok");
        let uri = name.to_string();
        assert_eq!(uri, "/%00%2F%25%FF/ok");
        assert_eq!(Name::from_str(&uri), name);
    }

    #[test]
    fn test_empty_and_period_components_roundtrip() {
        let name = Name::from_components(vec![
            b"a".to_vec(),
            Vec::new(),
            b".".to_vec(),
            b"...".to_vec(),
            b"b".to_vec(),
        ]);
        let uri = name.to_string();
        assert_eq!(uri, "/a/.../..../....../b");
        let back = Name::from_str(&uri);
        assert_eq!(back.len(), 5);
        assert_eq!(back, name);

        let empty_only = Name::from_components(vec![Vec::new()]);
        assert_eq!(empty_only.to_string(), "/...");
        assert_eq!(Name::from_str("/..."), empty_only);
        assert_ne!(Name::from_str("/..."), Name::new());
    }

    #[test]
    fn test_short_period_parts_kept_verbatim() {
        let name = Name::from_str("/./..");
        assert_eq!(name.get(0), Some(&b"."[..]));
        assert_eq!(name.get(1), Some(&b".."[..]));
    }

    #[test]
    fn test_malformed_escape_kept_verbatim() {
        let name = Name::from_str("/100%/x%zz");
        assert_eq!(name.get(0), Some(&b"100%"[..]));
        assert_eq!(name.get(1), Some(&b"x%zz"[..]));
    }
}
