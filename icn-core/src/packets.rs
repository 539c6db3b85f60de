use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::Name;

/// Interest packet requesting the content behind a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub name_payload: Option<Vec<u8>>,
}

impl Interest {
    /// Create a new Interest with the given name
    pub fn new(name: Name) -> Self {
        Self {
            name,
            name_payload: None,
        }
    }

    pub fn with_name_payload(mut self, payload: Vec<u8>) -> Self {
        self.name_payload = Some(payload);
        self
    }
}

/// Content packet carrying the payload for a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content {
    pub name: Name,
    pub content: Vec<u8>,
    pub name_payload: Option<Vec<u8>>,
}

impl Content {
    /// Create a new Content packet with the given name and payload
    pub fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            content,
            name_payload: None,
        }
    }

    pub fn with_name_payload(mut self, payload: Vec<u8>) -> Self {
        self.name_payload = Some(payload);
        self
    }

    /// Check if this Content answers the given Interest exactly
    pub fn matches_interest(&self, interest: &Interest) -> bool {
        self.name == interest.name
    }
}

/// Reason carried by a Nack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NackReason {
    NoRoute,
    NoContent,
    CompQueueFull,
    CompParamUnavailable,
    CompException,
    CompTerminated,
    CompNotRunning,
    CompNotParsed,
    Duplicate,
    Congestion,
    NotSet,
}

impl NackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NackReason::NoRoute => "no forwarding rule",
            NackReason::NoContent => "no content available",
            NackReason::CompQueueFull => "computation queue full",
            NackReason::CompParamUnavailable => "computation parameter unavailable",
            NackReason::CompException => "computation exception",
            NackReason::CompTerminated => "computation terminated",
            NackReason::CompNotRunning => "computation not running",
            NackReason::CompNotParsed => "computation could not be parsed",
            NackReason::Duplicate => "duplicate",
            NackReason::Congestion => "congestion",
            NackReason::NotSet => "not set",
        }
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Negative acknowledgement for an Interest that could not be satisfied
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nack {
    pub name: Name,
    pub reason: NackReason,
    pub interest: Interest,
}

impl Nack {
    /// Create a Nack answering the given Interest
    pub fn new(reason: NackReason, interest: Interest) -> Self {
        Self {
            name: interest.name.clone(),
            reason,
            interest,
        }
    }
}

/// Packets exchanged between the forwarder and its faces.
///
/// `Unknown` carries whatever the codec could not classify so the forwarder
/// can report and discard it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    Interest(Interest),
    Content(Content),
    Nack(Nack),
    Unknown(Vec<u8>),
}

impl Packet {
    /// Get the name of the packet, if it has one
    pub fn name(&self) -> Option<&Name> {
        match self {
            Packet::Interest(interest) => Some(&interest.name),
            Packet::Content(content) => Some(&content.name),
            Packet::Nack(nack) => Some(&nack.name),
            Packet::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Interest(_) => "Interest",
            Packet::Content(_) => "Content",
            Packet::Nack(_) => "Nack",
            Packet::Unknown(_) => "Unknown",
        }
    }

    pub fn is_interest(&self) -> bool {
        matches!(self, Packet::Interest(_))
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Packet::Content(_))
    }

    pub fn is_nack(&self) -> bool {
        matches!(self, Packet::Nack(_))
    }
}

impl From<Interest> for Packet {
    fn from(interest: Interest) -> Self {
        Packet::Interest(interest)
    }
}

impl From<Content> for Packet {
    fn from(content: Content) -> Self {
        Packet::Content(content)
    }
}

impl From<Nack> for Packet {
    fn from(nack: Nack) -> Self {
        Packet::Nack(nack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_creation() {
        let interest = Interest::new(Name::from_str("/test/interest")).with_name_payload(b"args".to_vec());
        assert_eq!(interest.name.to_string(), "/test/interest");
        assert_eq!(interest.name_payload.as_deref(), Some(&b"args"[..]));
    }

    #[test]
    fn test_content_matches_interest() {
        let interest = Interest::new(Name::from_str("/test/data"));
        let content = Content::new(Name::from_str("/test/data"), b"payload".to_vec());
        let other = Content::new(Name::from_str("/test/data/1"), b"payload".to_vec());
        assert!(content.matches_interest(&interest));
        assert!(!other.matches_interest(&interest));
    }

    #[test]
    fn test_nack_takes_interest_name() {
        let interest = Interest::new(Name::from_str("/missing"));
        let nack = Nack::new(NackReason::NoRoute, interest.clone());
        assert_eq!(nack.name, interest.name);
        assert_eq!(nack.interest, interest);
        assert_eq!(nack.reason.to_string(), "no forwarding rule");
    }

    #[test]
    fn test_packet_enum() {
        let interest = Packet::from(Interest::new(Name::from_str("/test")));
        let content = Packet::from(Content::new(Name::from_str("/test"), b"content".to_vec()));
        let nack = Packet::from(Nack::new(NackReason::NoContent, Interest::new(Name::from_str("/test"))));
        let unknown = Packet::Unknown(vec![0xde, 0xad]);

        assert!(interest.is_interest() && !interest.is_content());
        assert!(content.is_content() && !content.is_nack());
        assert!(nack.is_nack());
        assert_eq!(unknown.name(), None);
        assert_eq!(unknown.kind(), "Unknown");
        assert_eq!(nack.name(), Some(&Name::from_str("/test")));
    }

    #[test]
    fn test_packet_serializes_with_variant_tag() {
        let packet = Packet::from(Interest::new(Name::from_str("/a")));
        let json = serde_json::to_value(&packet).unwrap();
        assert!(json.get("Interest").is_some());
        let back: Packet = serde_json::from_value(json).unwrap();
        assert_eq!(back, packet);
    }
}
