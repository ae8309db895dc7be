//! Game Events
//!
//! Lifecycle events emitted by the session for UI and logging hooks.

use serde::{Serialize, Deserialize};

use crate::game::game_over::{EndCause, GameResult};
use crate::game::piece::PieceId;
use crate::game::rematch::{RematchDecision, RematchResolution};
use crate::game::state::Side;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A new held piece appeared
    PieceSpawned {
        piece_id: PieceId,
        type_index: u8,
        owner: Side,
    },

    /// The held piece was released
    PieceDropped {
        piece_id: PieceId,
    },

    /// A dropping piece came to rest
    PieceSettled {
        piece_id: PieceId,
        score: u32,
    },

    /// Turn passed to the other side
    TurnChanged {
        turn: Side,
    },

    /// World extended upward
    WorldGrown {
        top: f32,
        height: f32,
    },

    /// Match over
    GameEnded {
        result: GameResult,
        cause: EndCause,
    },

    /// A rematch slot was filled
    RematchDecided {
        side: Side,
        decision: RematchDecision,
    },

    /// Both slots resolved
    RematchResolved {
        resolution: RematchResolution,
    },

    /// Fresh match in the same room
    Restarted,

    /// Session disbanded, back to the lobby
    ReturnedToLobby,
}

/// A game event stamped with the physics tick it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Physics tick count at emission
    pub tick: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create piece spawned event.
    pub fn piece_spawned(tick: u32, piece_id: PieceId, type_index: u8, owner: Side) -> Self {
        Self::new(tick, GameEventData::PieceSpawned { piece_id, type_index, owner })
    }

    /// Create piece settled event.
    pub fn piece_settled(tick: u32, piece_id: PieceId, score: u32) -> Self {
        Self::new(tick, GameEventData::PieceSettled { piece_id, score })
    }

    /// Create game ended event.
    pub fn game_ended(tick: u32, result: GameResult, cause: EndCause) -> Self {
        Self::new(tick, GameEventData::GameEnded { result, cause })
    }
}

/// Receives session lifecycle events.
pub trait SessionListener {
    /// Called once per event, in emission order.
    fn on_event(&mut self, event: &GameEvent);
}

/// Listener that keeps every event it receives.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<GameEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take and clear the received events.
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// True if any received event matches.
    pub fn contains(&self, predicate: impl Fn(&GameEventData) -> bool) -> bool {
        self.events.iter().any(|e| predicate(&e.data))
    }
}

impl SessionListener for EventLog {
    fn on_event(&mut self, event: &GameEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_records_in_order() {
        let mut log = EventLog::new();
        log.on_event(&GameEvent::piece_spawned(0, PieceId(1), 2, Side::Host));
        log.on_event(&GameEvent::piece_settled(40, PieceId(1), 1));

        assert_eq!(log.events().len(), 2);
        assert!(log.contains(|d| matches!(d, GameEventData::PieceSettled { score: 1, .. })));
        assert!(!log.contains(|d| matches!(d, GameEventData::Restarted)));

        let drained = log.drain();
        assert_eq!(drained[0].tick, 0);
        assert!(log.events().is_empty());
    }
}
