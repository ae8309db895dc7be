//! Lobby
//!
//! Creating a room makes this peer the host; joining one by id makes it the
//! client. Join input is normalized and validated before the network is
//! contacted.

use tracing::{info, warn};

use crate::core::rng::DeterministicRng;
use crate::game::state::Side;
use crate::network::room::{RoomId, RoomIdError};
use crate::network::transport::{PeerJoin, PeerNetwork, PeerRoom, Transport, TransportError};

/// Attempts at finding a free generated room id.
const CREATE_ATTEMPTS: usize = 4;

/// System clipboard.
pub trait Clipboard {
    /// Replace the clipboard contents.
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// Clipboard failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Outcome of copying the room id, for the copy button label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    /// Written to the clipboard.
    Copied,
    /// Clipboard refused.
    Failed,
}

/// Clipboard kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    /// Last written text.
    pub contents: Option<String>,
    /// Refuse every write.
    pub deny: bool,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.deny {
            return Err(ClipboardError("permission denied".to_string()));
        }
        self.contents = Some(text.to_string());
        Ok(())
    }
}

/// Where the lobby stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyStatus {
    /// Nothing joined yet.
    Idle,
    /// Room created, waiting for the other player.
    Waiting(RoomId),
    /// In a room with a known role.
    Joined(RoomId, Side),
}

/// A joined room together with this peer's role.
pub struct JoinedRoom<R: PeerRoom> {
    /// Role in the room.
    pub role: Side,
    /// Room handle.
    pub room: R,
}

impl<R: PeerRoom + 'static> JoinedRoom<R> {
    /// Room id.
    pub fn room_id(&self) -> &RoomId {
        self.room.room_id()
    }

    /// Notification for the other player arriving.
    pub fn on_peer_join(&self) -> PeerJoin {
        self.room.on_peer_join()
    }

    /// Hand the room to a session.
    pub fn into_transport(self) -> Transport {
        Transport::Connected(Box::new(self.room))
    }
}

/// Room creation and joining.
pub struct Lobby<N: PeerNetwork> {
    network: N,
    rng: DeterministicRng,
    status: LobbyStatus,
}

impl<N: PeerNetwork> Lobby<N> {
    /// Create a lobby on a network. `seed` drives room id generation.
    pub fn new(network: N, seed: u64) -> Self {
        Self {
            network,
            rng: DeterministicRng::new(seed),
            status: LobbyStatus::Idle,
        }
    }

    /// Current status.
    pub fn status(&self) -> &LobbyStatus {
        &self.status
    }

    /// Generate a room id and join it as host.
    pub async fn create_room(&mut self) -> Result<JoinedRoom<N::Room>, LobbyError> {
        let mut last = None;
        for _ in 0..CREATE_ATTEMPTS {
            let room_id = RoomId::generate(&mut self.rng);
            match self.network.join(&room_id).await {
                Ok(room) => {
                    info!("Created room {}, waiting for opponent", room_id);
                    self.status = LobbyStatus::Waiting(room_id);
                    return Ok(JoinedRoom { role: Side::Host, room });
                }
                Err(e @ TransportError::RoomFull(_)) => {
                    warn!("Generated room {} is taken", room_id);
                    last = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(last.unwrap_or(TransportError::Unavailable).into())
    }

    /// Join an existing room as client.
    ///
    /// The input is trimmed and uppercased; an invalid id is rejected
    /// without touching the network.
    pub async fn join_room(&mut self, input: &str) -> Result<JoinedRoom<N::Room>, LobbyError> {
        let room_id = RoomId::normalize(input)?;
        let room = self.network.join(&room_id).await?;
        info!("Joined room {}", room_id);
        self.status = LobbyStatus::Joined(room_id, Side::Client);
        Ok(JoinedRoom { role: Side::Client, room })
    }

    /// Record that the opponent arrived in the room we created.
    pub fn peer_arrived(&mut self) {
        if let LobbyStatus::Waiting(room_id) = &self.status {
            self.status = LobbyStatus::Joined(room_id.clone(), Side::Host);
        }
    }

    /// Copy the current room id for sharing.
    pub fn copy_room_id(&self, clipboard: &mut dyn Clipboard) -> CopyStatus {
        let room_id = match &self.status {
            LobbyStatus::Waiting(id) | LobbyStatus::Joined(id, _) => id,
            LobbyStatus::Idle => return CopyStatus::Failed,
        };
        match clipboard.write_text(room_id.as_str()) {
            Ok(()) => CopyStatus::Copied,
            Err(e) => {
                warn!("Copy failed: {}", e);
                CopyStatus::Failed
            }
        }
    }

    /// Back to idle after a session closes.
    pub fn reset(&mut self) {
        self.status = LobbyStatus::Idle;
    }
}

/// Lobby errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Room id failed validation.
    #[error("Invalid room id: {0}")]
    InvalidRoomId(#[from] RoomIdError),

    /// Transport refused the join.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use crate::network::transport::{LoopbackNetwork, LoopbackRoom};

    /// Counts join attempts.
    #[derive(Clone, Default)]
    struct CountingNetwork {
        inner: LoopbackNetwork,
        joins: Arc<AtomicUsize>,
    }

    impl PeerNetwork for CountingNetwork {
        type Room = LoopbackRoom;

        async fn join(&self, room_id: &RoomId) -> Result<LoopbackRoom, TransportError> {
            self.joins.fetch_add(1, Ordering::SeqCst);
            self.inner.join(room_id).await
        }
    }

    #[tokio::test]
    async fn test_create_then_join() {
        let network = LoopbackNetwork::new();
        let mut host_lobby = Lobby::new(network.clone(), 1);
        let mut client_lobby = Lobby::new(network.clone(), 2);

        let hosted = host_lobby.create_room().await.unwrap();
        assert_eq!(hosted.role, Side::Host);
        let room_id = hosted.room_id().clone();
        assert_eq!(host_lobby.status(), &LobbyStatus::Waiting(room_id.clone()));

        let mut arrived = hosted.on_peer_join();
        let input = format!("  {}  ", room_id.as_str().to_lowercase());
        let joined = client_lobby.join_room(&input).await.unwrap();
        assert_eq!(joined.role, Side::Client);
        assert_eq!(joined.room_id(), &room_id);

        assert!(arrived.wait().await);
        host_lobby.peer_arrived();
        assert_eq!(host_lobby.status(), &LobbyStatus::Joined(room_id, Side::Host));
    }

    #[tokio::test]
    async fn test_invalid_id_never_reaches_network() {
        let network = CountingNetwork::default();
        let mut lobby = Lobby::new(network.clone(), 1);

        for bad in ["", "ABC", "ABCDEFG", "AB_CDE", "ab cd1"] {
            assert!(matches!(lobby.join_room(bad).await, Err(LobbyError::InvalidRoomId(_))));
        }
        assert_eq!(network.joins.load(Ordering::SeqCst), 0);
        assert_eq!(lobby.status(), &LobbyStatus::Idle);

        assert!(lobby.join_room("abc123").await.is_ok());
        assert_eq!(network.joins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_room_rejected() {
        let network = LoopbackNetwork::new();
        let mut a = Lobby::new(network.clone(), 1);
        let mut b = Lobby::new(network.clone(), 2);
        let mut c = Lobby::new(network.clone(), 3);

        let hosted = a.create_room().await.unwrap();
        let id = hosted.room_id().as_str().to_string();
        let _joined = b.join_room(&id).await.unwrap();
        assert!(matches!(c.join_room(&id).await, Err(LobbyError::Transport(TransportError::RoomFull(_)))));
    }

    #[tokio::test]
    async fn test_copy_room_id() {
        let mut lobby = Lobby::new(LoopbackNetwork::new(), 5);
        let mut clipboard = MemoryClipboard::default();
        assert_eq!(lobby.copy_room_id(&mut clipboard), CopyStatus::Failed);

        let hosted = lobby.create_room().await.unwrap();
        assert_eq!(lobby.copy_room_id(&mut clipboard), CopyStatus::Copied);
        assert_eq!(clipboard.contents.as_deref(), Some(hosted.room_id().as_str()));

        clipboard.deny = true;
        assert_eq!(lobby.copy_room_id(&mut clipboard), CopyStatus::Failed);
    }
}
