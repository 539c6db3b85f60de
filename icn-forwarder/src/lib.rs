//! Forwarding plane of the ICN daemon: Content Store, FIB, PIT and the
//! engine that ties them together.

pub mod config;
pub mod content_store;
pub mod engine;
pub mod error;
pub mod fib;
pub mod management;
pub mod pit;

pub use config::{ContentStoreKind, ForwardingConfig};
pub use content_store::{ContentStore, ContentStoreEntry, ExactMatchContentStore, PrefixMatchContentStore};
pub use engine::{
    AgeingReport, FacePacket, ForwarderChannels, ForwardingAction, ForwardingEngine, ForwardingStats,
};
pub use error::{Direction, ForwarderError, Result};
pub use fib::{FibEntry, ForwardingInformationBase};
pub use management::{FaceRemoval, ManagementHandle, TableSnapshot};
pub use pit::{NackProgress, Origin, PendingInterestTable, PitEntry, PitInsert};
