//! Network Layer
//!
//! Rooms, wire messages and the per-peer session that binds a match to a
//! transport. Only the host's state is authoritative; the client mirrors it
//! from snapshots and forwards its own input.

pub mod room;
pub mod protocol;
pub mod transport;
pub mod sync;
pub mod session;
pub mod lobby;
pub mod driver;

pub use room::{RoomId, RoomIdError};
pub use protocol::{
    ChannelName, Envelope, InputMessage, PeerMessage, PieceSync, ProtocolError,
    SyncPayload, WireFormat,
};
pub use transport::{
    LoopbackNetwork, LoopbackRoom, PeerJoin, PeerNetwork, PeerRoom, Transport, TransportError,
};
pub use sync::{ReconcileReport, SyncBroadcaster, SyncReconciler};
pub use session::{GameSession, SessionConfig, SessionError, SessionState, SessionSummary};
pub use lobby::{Clipboard, ClipboardError, CopyStatus, JoinedRoom, Lobby, LobbyError, LobbyStatus, MemoryClipboard};
pub use driver::{run_session, DriverExit, DriverReport, UiCommand};
