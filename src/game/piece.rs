//! Piece Lifecycle
//!
//! Piece identity, the Held/Dropping/Settled registry, and stillness detection.
//!
//! The registry keeps settled pieces in a `BTreeMap` keyed by id and at most one
//! *active* piece (held or dropping) in a dedicated slot, so two live pieces
//! cannot exist at once.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::catalog::{self, PieceKind};
use crate::game::state::Side;

// =============================================================================
// PIECE ID
// =============================================================================

/// Session-unique, strictly increasing piece identifier.
///
/// Rendered on the wire as `"p<n>"`, starting from `"p1"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PieceId(pub u32);

impl PieceId {
    /// Sequence number.
    pub fn seq(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl FromStr for PieceId {
    type Err = PieceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('p')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(PieceId)
            .ok_or_else(|| PieceError::BadId(s.to_string()))
    }
}

impl TryFrom<String> for PieceId {
    type Error = PieceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PieceId> for String {
    fn from(id: PieceId) -> Self {
        id.to_string()
    }
}

// =============================================================================
// PIECE
// =============================================================================

/// Lifecycle state of a piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceState {
    /// Under a player's pointer, not simulated.
    Held,
    /// Released into the simulation, not yet at rest.
    Dropping,
    /// Confirmed at rest and part of the tower.
    Settled,
}

/// A stackable piece.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    /// Unique id
    pub id: PieceId,
    /// Index into the piece catalog
    pub type_index: u8,
    /// Centre position
    pub position: Vec2,
    /// Rotation in degrees
    pub angle: f32,
    /// Side that placed this piece
    pub owner: Side,
    /// Lifecycle state (maintained by [`PieceRegistry`])
    pub state: PieceState,
}

impl Piece {
    /// Catalog entry for this piece.
    pub fn kind(&self) -> Option<&'static PieceKind> {
        catalog::kind(self.type_index)
    }

    /// Y of the top edge of the piece's axis-aligned bounds.
    pub fn top_bound(&self) -> f32 {
        match self.kind() {
            Some(kind) => {
                let rad = self.angle.to_radians();
                let half_extent = kind.half_width * rad.sin().abs()
                    + kind.half_height * rad.cos().abs();
                self.position.y - half_extent
            }
            None => self.position.y,
        }
    }
}

// =============================================================================
// STILLNESS
// =============================================================================

/// Thresholds for deciding that a dropped piece has come to rest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StillnessRule {
    /// Linear speed must be strictly below this.
    pub max_speed: f32,
    /// Angular speed must be strictly below this.
    pub max_angular_speed: f32,
    /// Consecutive qualifying ticks required.
    pub run_length: u32,
}

/// Counts consecutive still ticks of the dropping piece.
///
/// Contact resolution produces transient near-zero velocities before final
/// rest, so a single quiet tick never settles a piece.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StillnessTracker {
    run: u32,
}

impl StillnessTracker {
    /// Feed one tick of body speeds. Returns true once the run is complete.
    pub fn observe(&mut self, speed: f32, angular_speed: f32, rule: &StillnessRule) -> bool {
        if speed < rule.max_speed && angular_speed < rule.max_angular_speed {
            self.run = self.run.saturating_add(1);
        } else {
            self.run = 0;
        }
        self.run >= rule.run_length
    }

    /// Current consecutive run.
    pub fn run(&self) -> u32 {
        self.run
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// The single held or dropping piece.
#[derive(Clone, Debug)]
struct ActivePiece {
    piece: Piece,
    stillness: StillnessTracker,
}

/// Registry of every piece in the session.
#[derive(Clone, Debug, Default)]
pub struct PieceRegistry {
    /// Highest sequence number issued or observed.
    last_seq: u32,
    /// Settled pieces (sorted by id).
    settled: BTreeMap<PieceId, Piece>,
    /// Held or dropping piece, if any.
    active: Option<ActivePiece>,
}

impl PieceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next piece id.
    pub fn allocate_id(&mut self) -> PieceId {
        self.last_seq += 1;
        PieceId(self.last_seq)
    }

    /// Record an id created elsewhere so local allocation stays monotonic.
    fn observe_id(&mut self, id: PieceId) {
        self.last_seq = self.last_seq.max(id.0);
    }

    /// Create a new held piece with a fresh id.
    pub fn spawn_held(
        &mut self,
        type_index: u8,
        position: Vec2,
        owner: Side,
    ) -> Result<&Piece, PieceError> {
        if catalog::kind(type_index).is_none() {
            return Err(PieceError::UnknownKind(type_index));
        }
        if let Some(active) = &self.active {
            return Err(PieceError::ActivePieceExists(active.piece.id));
        }
        let id = self.allocate_id();
        let piece = Piece {
            id,
            type_index,
            position,
            angle: 0.0,
            owner,
            state: PieceState::Held,
        };
        Ok(&self.active.insert(ActivePiece { piece, stillness: StillnessTracker::default() }).piece)
    }

    /// Adopt a piece created by the remote peer as the local held piece.
    pub fn adopt_held(&mut self, mut piece: Piece) -> Result<(), PieceError> {
        if let Some(active) = &self.active {
            return Err(PieceError::ActivePieceExists(active.piece.id));
        }
        if self.contains(piece.id) {
            return Err(PieceError::DuplicateId(piece.id));
        }
        self.observe_id(piece.id);
        piece.state = PieceState::Held;
        self.active = Some(ActivePiece { piece, stillness: StillnessTracker::default() });
        Ok(())
    }

    /// Insert a piece directly as settled.
    pub fn insert_settled(&mut self, mut piece: Piece) -> Result<(), PieceError> {
        if self.contains(piece.id) {
            return Err(PieceError::DuplicateId(piece.id));
        }
        self.observe_id(piece.id);
        piece.state = PieceState::Settled;
        self.settled.insert(piece.id, piece);
        Ok(())
    }

    /// Release the held piece into the simulation.
    pub fn release(&mut self) -> Result<PieceId, PieceError> {
        match &mut self.active {
            Some(active) if active.piece.state == PieceState::Held => {
                active.piece.state = PieceState::Dropping;
                active.stillness = StillnessTracker::default();
                Ok(active.piece.id)
            }
            _ => Err(PieceError::NoHeldPiece),
        }
    }

    /// Feed one tick of the dropping piece's speeds.
    ///
    /// Promotes the piece to settled and returns its id once the stillness run
    /// completes. Does nothing if no piece is dropping.
    pub fn observe_stillness(
        &mut self,
        speed: f32,
        angular_speed: f32,
        rule: &StillnessRule,
    ) -> Option<PieceId> {
        let active = self.active.as_mut()?;
        if active.piece.state != PieceState::Dropping {
            return None;
        }
        if active.stillness.observe(speed, angular_speed, rule) {
            self.settle_active()
        } else {
            None
        }
    }

    /// Move the active piece (held or dropping) into the settled set.
    pub fn settle_active(&mut self) -> Option<PieceId> {
        let ActivePiece { mut piece, .. } = self.active.take()?;
        piece.state = PieceState::Settled;
        let id = piece.id;
        self.settled.insert(id, piece);
        Some(id)
    }

    /// The held piece, if any.
    pub fn held(&self) -> Option<&Piece> {
        self.active
            .as_ref()
            .map(|a| &a.piece)
            .filter(|p| p.state == PieceState::Held)
    }

    /// Mutable access to the held piece.
    pub fn held_mut(&mut self) -> Option<&mut Piece> {
        self.active
            .as_mut()
            .map(|a| &mut a.piece)
            .filter(|p| p.state == PieceState::Held)
    }

    /// The dropping piece, if any.
    pub fn dropping(&self) -> Option<&Piece> {
        self.active
            .as_ref()
            .map(|a| &a.piece)
            .filter(|p| p.state == PieceState::Dropping)
    }

    /// The held or dropping piece.
    pub fn active(&self) -> Option<&Piece> {
        self.active.as_ref().map(|a| &a.piece)
    }

    /// Stillness run of the dropping piece.
    pub fn stillness_run(&self) -> u32 {
        self.active.as_ref().map(|a| a.stillness.run()).unwrap_or(0)
    }

    /// Look up any piece by id.
    pub fn get(&self, id: PieceId) -> Option<&Piece> {
        match &self.active {
            Some(active) if active.piece.id == id => Some(&active.piece),
            _ => self.settled.get(&id),
        }
    }

    /// Mutable lookup of any piece by id.
    pub fn get_mut(&mut self, id: PieceId) -> Option<&mut Piece> {
        match &mut self.active {
            Some(active) if active.piece.id == id => Some(&mut active.piece),
            _ => self.settled.get_mut(&id),
        }
    }

    /// Whether a piece with this id is known.
    pub fn contains(&self, id: PieceId) -> bool {
        self.get(id).is_some()
    }

    /// Settled pieces in id order.
    pub fn settled(&self) -> impl Iterator<Item = &Piece> {
        self.settled.values()
    }

    /// Number of settled pieces.
    pub fn settled_len(&self) -> usize {
        self.settled.len()
    }

    /// All pieces: settled in id order, then the active piece.
    pub fn iter(&self) -> impl Iterator<Item = &Piece> {
        self.settled.values().chain(self.active.as_ref().map(|a| &a.piece))
    }

    /// All piece ids.
    pub fn ids(&self) -> Vec<PieceId> {
        self.iter().map(|p| p.id).collect()
    }

    /// Total number of pieces.
    pub fn len(&self) -> usize {
        self.settled.len() + usize::from(self.active.is_some())
    }

    /// True if the registry holds no pieces.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every piece and restart id allocation.
    pub fn clear(&mut self) {
        self.settled.clear();
        self.active = None;
        self.last_seq = 0;
    }
}

/// Piece registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PieceError {
    /// A held or dropping piece already exists.
    #[error("Piece {0} is already active")]
    ActivePieceExists(PieceId),

    /// No piece is held.
    #[error("No held piece")]
    NoHeldPiece,

    /// Id already present.
    #[error("Duplicate piece id {0}")]
    DuplicateId(PieceId),

    /// Catalog index out of range.
    #[error("Unknown piece kind {0}")]
    UnknownKind(u8),

    /// Malformed id string.
    #[error("Bad piece id {0:?}")]
    BadId(String),
}
