//! adhoc-core
//!
//! Pure session/topology logic for the ad-hoc hub:
//! - sessions (one per accepted connection)
//! - groups and games
//! - the topology registry that owns them
//! - the per-session protocol state machine
//!
//! Nothing here touches sockets. The hub consumes raw bytes and returns
//! an ordered list of [`Output`]s for the networking layer to apply.

pub mod error;
pub mod messages;
pub mod session;
pub mod group;
pub mod game;
pub mod directory;
pub mod snapshot;
pub mod topology;
pub mod hub;

pub use error::{Refusal, Violation};
pub use messages::{LogoutReason, Output};
pub use session::{Session, SessionId, SessionState};
pub use group::Group;
pub use game::Game;
pub use directory::{MemoryDirectory, ProductDirectory};
pub use snapshot::{GameSnapshot, GroupSnapshot, TopologySnapshot};
pub use topology::Topology;
pub use hub::{Hub, HubConfig};
