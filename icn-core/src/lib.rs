pub mod name;
pub mod packets;

pub use name::Name;
pub use packets::{Content, Interest, Nack, NackReason, Packet};

/// Opaque identifier of a communication endpoint (network link or local application).
pub type FaceId = u32;
