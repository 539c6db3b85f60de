use std::fmt;

/// Direction of a forwarder channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Network faces
    Lower,
    /// Local applications
    Higher,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Lower => write!(f, "lower"),
            Direction::Higher => write!(f, "higher"),
        }
    }
}

/// Error types for the forwarding engine
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("{0} channel closed")]
    ChannelClosed(Direction),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ForwarderError>;
