//! Turn State Machine
//!
//! `Spawning -> Aiming -> Dropping -> Settling -> Spawning (turn flipped)`,
//! with `Ended` reachable from every state and absorbing.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::state::Side;

/// Phase of the current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// A new held piece is about to be created.
    Spawning,
    /// The turn's player is positioning the held piece.
    Aiming,
    /// The piece was just released.
    Dropping,
    /// Waiting for the released piece to come to rest.
    Settling,
    /// Game over; nothing further is accepted.
    Ended,
}

/// Whose turn it is and where that turn stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnStateMachine {
    turn: Side,
    phase: TurnPhase,
}

impl Default for TurnStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnStateMachine {
    /// Host moves first.
    pub fn new() -> Self {
        Self {
            turn: Side::Host,
            phase: TurnPhase::Spawning,
        }
    }

    /// Side on turn.
    #[inline]
    pub fn turn(&self) -> Side {
        self.turn
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// True once the game is over.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.phase == TurnPhase::Ended
    }

    /// True while the held piece accepts move/rotate/drop.
    #[inline]
    pub fn accepts_input(&self) -> bool {
        self.phase == TurnPhase::Aiming
    }

    /// `Spawning -> Aiming`.
    pub fn piece_spawned(&mut self) -> Result<(), TurnError> {
        self.advance(TurnPhase::Spawning, TurnPhase::Aiming, "spawn")
    }

    /// `Aiming -> Dropping`.
    pub fn release(&mut self) -> Result<(), TurnError> {
        self.advance(TurnPhase::Aiming, TurnPhase::Dropping, "release")
    }

    /// `Dropping -> Settling`.
    pub fn begin_settling(&mut self) -> Result<(), TurnError> {
        self.advance(TurnPhase::Dropping, TurnPhase::Settling, "settle")
    }

    /// `Settling -> Spawning`, flipping the turn. Returns the new side on turn.
    pub fn piece_settled(&mut self) -> Result<Side, TurnError> {
        self.advance(TurnPhase::Settling, TurnPhase::Spawning, "flip")?;
        self.turn = self.turn.other();
        debug!("Turn passes to {}", self.turn);
        Ok(self.turn)
    }

    /// Enter `Ended`. Returns false if already ended.
    pub fn end(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        self.phase = TurnPhase::Ended;
        true
    }

    /// Follow the host's turn value on a mirrored session.
    ///
    /// A changed turn restarts the phase at `Spawning`. Returns true if the
    /// turn changed.
    pub fn mirror_turn(&mut self, turn: Side) -> bool {
        if self.is_ended() || turn == self.turn {
            return false;
        }
        self.turn = turn;
        self.phase = TurnPhase::Spawning;
        true
    }

    /// Back to `Spawning` with the host on turn.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn advance(&mut self, from: TurnPhase, to: TurnPhase, action: &'static str) -> Result<(), TurnError> {
        if self.phase != from {
            return Err(TurnError::InvalidTransition { phase: self.phase, action });
        }
        self.phase = to;
        Ok(())
    }
}

/// Turn transition errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    /// The action is not valid in the current phase.
    #[error("Cannot {action} while {phase:?}")]
    InvalidTransition {
        /// Phase at the time of the attempt.
        phase: TurnPhase,
        /// Attempted action.
        action: &'static str,
    },
}
