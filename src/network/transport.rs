//! Peer Transport
//!
//! The contract a peer-to-peer room must offer: join by room id, learn when
//! the other player arrives, fire-and-forget sends on named channels, leave.
//! Delivery failures are not observable; whole-state snapshots make up for
//! lost messages.
//!
//! [`LoopbackNetwork`] implements the contract in process for tests and the
//! demo binary.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::network::protocol::{Envelope, PeerMessage, WireFormat};
use crate::network::room::RoomId;

/// Maximum members per room.
pub const ROOM_CAPACITY: usize = 2;

/// Outbox to the other member, published when they join.
type PeerSlot = Option<mpsc::UnboundedSender<Envelope>>;

// =============================================================================
// CONTRACT
// =============================================================================

/// A joined room.
pub trait PeerRoom: Send {
    /// Room this handle belongs to.
    fn room_id(&self) -> &RoomId;

    /// Send to the other member. Silently dropped if nobody is there.
    fn send(&self, envelope: Envelope);

    /// True while the other member is in the room.
    fn peer_present(&self) -> bool;

    /// Notification handle for the other member joining.
    fn on_peer_join(&self) -> PeerJoin;

    /// Take the receiving end of this member's inbox. Only the first call
    /// returns it.
    fn take_inbox(&mut self) -> Option<mpsc::UnboundedReceiver<Envelope>>;

    /// Leave the room. Idempotent.
    fn leave(&mut self);
}

/// Something that can put this peer into a room.
#[allow(async_fn_in_trait)]
pub trait PeerNetwork {
    /// Room handle type.
    type Room: PeerRoom + 'static;

    /// Join (or create) the room with this id.
    async fn join(&self, room_id: &RoomId) -> Result<Self::Room, TransportError>;
}

/// Waits for the other member of a room to arrive.
#[derive(Debug, Clone)]
pub struct PeerJoin {
    peer: watch::Receiver<PeerSlot>,
}

impl PeerJoin {
    /// Resolve once a peer is present. Returns false if the room went away
    /// first.
    pub async fn wait(&mut self) -> bool {
        self.peer.wait_for(|slot| slot.is_some()).await.is_ok()
    }

    /// Current presence.
    pub fn is_present(&self) -> bool {
        self.peer.borrow().is_some()
    }
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Both seats are taken.
    #[error("Room {0} is full")]
    RoomFull(RoomId),

    /// The room registry is unusable.
    #[error("Room registry unavailable")]
    Unavailable,
}

// =============================================================================
// SESSION TRANSPORT
// =============================================================================

/// How a session reaches the other player.
pub enum Transport {
    /// Single player; nothing is sent.
    Offline,
    /// Joined a room.
    Connected(Box<dyn PeerRoom>),
}

impl Transport {
    /// True for single-player sessions.
    pub fn is_offline(&self) -> bool {
        matches!(self, Transport::Offline)
    }

    /// Room id, if connected.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Transport::Offline => None,
            Transport::Connected(room) => Some(room.room_id()),
        }
    }

    /// Encode and send. Encoding failures are logged, never returned.
    pub fn send(&self, message: &PeerMessage, format: WireFormat) {
        let Transport::Connected(room) = self else { return };
        match message.encode(format) {
            Ok(envelope) => room.send(envelope),
            Err(e) => warn!("Dropping unencodable {} message: {}", message.channel(), e),
        }
    }

    /// Take this member's inbox.
    pub fn take_inbox(&mut self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        match self {
            Transport::Offline => None,
            Transport::Connected(room) => room.take_inbox(),
        }
    }

    /// Leave the room, if any.
    pub fn leave(&mut self) {
        if let Transport::Connected(room) = self {
            room.leave();
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Offline => f.write_str("Offline"),
            Transport::Connected(room) => write!(f, "Connected({})", room.room_id()),
        }
    }
}

// =============================================================================
// LOOPBACK
// =============================================================================

struct Member {
    id: u64,
    inbox: mpsc::UnboundedSender<Envelope>,
    peer: watch::Sender<PeerSlot>,
}

#[derive(Default)]
struct Registry {
    next_member: u64,
    rooms: BTreeMap<RoomId, Vec<Member>>,
}

/// In-process rooms shared by every clone.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    registry: Arc<Mutex<Registry>>,
}

impl LoopbackNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Members currently in a room.
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.registry
            .lock()
            .map(|r| r.rooms.get(room_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Number of open rooms.
    pub fn room_count(&self) -> usize {
        self.registry.lock().map(|r| r.rooms.len()).unwrap_or(0)
    }

    fn join_now(&self, room_id: &RoomId) -> Result<LoopbackRoom, TransportError> {
        let mut registry = self.registry.lock().map_err(|_| TransportError::Unavailable)?;
        registry.next_member += 1;
        let id = registry.next_member;

        let members = registry.rooms.entry(room_id.clone()).or_default();
        if members.len() >= ROOM_CAPACITY {
            return Err(TransportError::RoomFull(room_id.clone()));
        }

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let existing = members.first().map(|m| m.inbox.clone());
        let (peer_tx, peer_rx) = watch::channel(existing);
        for other in members.iter() {
            other.peer.send_replace(Some(inbox_tx.clone()));
        }
        members.push(Member { id, inbox: inbox_tx, peer: peer_tx });

        info!("Member {} joined room {} ({}/{})", id, room_id, members.len(), ROOM_CAPACITY);
        Ok(LoopbackRoom {
            room_id: room_id.clone(),
            member_id: id,
            registry: Arc::clone(&self.registry),
            inbox: Some(inbox_rx),
            peer: peer_rx,
            joined: true,
        })
    }
}

impl PeerNetwork for LoopbackNetwork {
    type Room = LoopbackRoom;

    async fn join(&self, room_id: &RoomId) -> Result<LoopbackRoom, TransportError> {
        self.join_now(room_id)
    }
}

/// A member's handle on a loopback room.
pub struct LoopbackRoom {
    room_id: RoomId,
    member_id: u64,
    registry: Arc<Mutex<Registry>>,
    inbox: Option<mpsc::UnboundedReceiver<Envelope>>,
    peer: watch::Receiver<PeerSlot>,
    joined: bool,
}

impl PeerRoom for LoopbackRoom {
    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn send(&self, envelope: Envelope) {
        if !self.joined {
            return;
        }
        if let Some(peer) = self.peer.borrow().as_ref() {
            if peer.send(envelope).is_err() {
                debug!("Peer inbox closed in room {}", self.room_id);
            }
        }
    }

    fn peer_present(&self) -> bool {
        self.joined && self.peer.borrow().is_some()
    }

    fn on_peer_join(&self) -> PeerJoin {
        PeerJoin { peer: self.peer.clone() }
    }

    fn take_inbox(&mut self) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.inbox.take()
    }

    fn leave(&mut self) {
        if !std::mem::replace(&mut self.joined, false) {
            return;
        }
        self.inbox = None;
        let Ok(mut registry) = self.registry.lock() else { return };
        if let Some(members) = registry.rooms.get_mut(&self.room_id) {
            members.retain(|m| m.id != self.member_id);
            for other in members.iter() {
                other.peer.send_replace(None);
            }
            if members.is_empty() {
                registry.rooms.remove(&self.room_id);
            }
        }
        info!("Member {} left room {}", self.member_id, self.room_id);
    }
}

impl Drop for LoopbackRoom {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rematch::RematchDecision;
    use crate::network::protocol::ChannelName;

    fn room(id: &str) -> RoomId {
        RoomId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_two_members_exchange() {
        let network = LoopbackNetwork::new();
        let mut host = network.join(&room("ABC123")).await.unwrap();
        assert!(!host.peer_present());

        let mut client = network.join(&room("ABC123")).await.unwrap();
        assert!(host.peer_present());
        assert!(client.peer_present());

        let mut host_inbox = host.take_inbox().unwrap();
        let mut client_inbox = client.take_inbox().unwrap();
        assert!(host.take_inbox().is_none());

        let envelope = PeerMessage::Rematch(RematchDecision::Rematch)
            .encode(WireFormat::Json)
            .unwrap();
        host.send(envelope.clone());
        assert_eq!(client_inbox.recv().await.unwrap(), envelope);

        client.send(Envelope { channel: ChannelName::Input, payload: b"{}".to_vec() });
        assert_eq!(host_inbox.recv().await.unwrap().channel, ChannelName::Input);
    }

    #[tokio::test]
    async fn test_third_member_rejected() {
        let network = LoopbackNetwork::new();
        let _a = network.join(&room("ROOM01")).await.unwrap();
        let _b = network.join(&room("ROOM01")).await.unwrap();
        assert_eq!(
            network.join(&room("ROOM01")).await.err(),
            Some(TransportError::RoomFull(room("ROOM01")))
        );
    }

    #[tokio::test]
    async fn test_peer_join_notification() {
        let network = LoopbackNetwork::new();
        let host = network.join(&room("WAIT00")).await.unwrap();
        let mut joined = host.on_peer_join();
        assert!(!joined.is_present());

        let _client = network.join(&room("WAIT00")).await.unwrap();
        assert!(joined.wait().await);
    }

    #[tokio::test]
    async fn test_leave_releases_room() {
        let network = LoopbackNetwork::new();
        let mut host = network.join(&room("BYE000")).await.unwrap();
        let mut client = network.join(&room("BYE000")).await.unwrap();

        client.leave();
        client.leave();
        assert!(!host.peer_present());
        assert_eq!(network.member_count(&room("BYE000")), 1);

        host.leave();
        assert_eq!(network.room_count(), 0);
    }

    #[tokio::test]
    async fn test_send_without_peer_is_dropped() {
        let network = LoopbackNetwork::new();
        let host = network.join(&room("SOLO00")).await.unwrap();
        host.send(Envelope { channel: ChannelName::Sync, payload: vec![1, 2, 3] });

        let transport = Transport::Offline;
        transport.send(&PeerMessage::Rematch(RematchDecision::Quit), WireFormat::Json);
        assert!(transport.room_id().is_none());
    }
}
