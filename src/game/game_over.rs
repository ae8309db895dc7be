//! Game Over Detection
//!
//! Collapse and timeout triggers, plus the one-shot terminal latch.

use serde::{Serialize, Deserialize};

use crate::game::piece::Piece;
use crate::game::state::Side;

/// Final result of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// Host won.
    Host,
    /// Client won.
    Client,
    /// Nobody won.
    Draw,
}

impl GameResult {
    /// Result when `side` loses.
    pub fn against(side: Side) -> Self {
        match side.other() {
            Side::Host => GameResult::Host,
            Side::Client => GameResult::Client,
        }
    }

    /// Winning side, if any.
    pub fn winner(self) -> Option<Side> {
        match self {
            GameResult::Host => Some(Side::Host),
            GameResult::Client => Some(Side::Client),
            GameResult::Draw => None,
        }
    }
}

/// What ended the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    /// A piece fell past the floor line.
    Collapse,
    /// The countdown ran out.
    Timeout,
    /// Result received from the host.
    Remote,
}

/// Evaluates end-of-game triggers and latches the first result.
#[derive(Clone, Debug)]
pub struct GameOverDetector {
    fall_line: f32,
    result: Option<(GameResult, EndCause)>,
}

impl GameOverDetector {
    /// Create a detector. Pieces below `fall_line` count as fallen.
    pub fn new(fall_line: f32) -> Self {
        Self {
            fall_line,
            result: None,
        }
    }

    /// Check whether any piece has fallen off.
    ///
    /// The side on turn caused the collapse, so the other side wins.
    pub fn check_collapse<'a>(
        &self,
        mut pieces: impl Iterator<Item = &'a Piece>,
        turn: Side,
    ) -> Option<GameResult> {
        pieces
            .any(|p| p.position.y > self.fall_line)
            .then(|| GameResult::against(turn))
    }

    /// Check whether the countdown has expired.
    pub fn check_timeout(&self, time_left_secs: u32) -> Option<GameResult> {
        (time_left_secs == 0).then_some(GameResult::Draw)
    }

    /// Latch a result. Returns false if a result was already latched.
    pub fn fire(&mut self, result: GameResult, cause: EndCause) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some((result, cause));
        true
    }

    /// The latched result.
    pub fn result(&self) -> Option<GameResult> {
        self.result.map(|(r, _)| r)
    }

    /// The latched cause.
    pub fn cause(&self) -> Option<EndCause> {
        self.result.map(|(_, c)| c)
    }

    /// Clear the latch for a new match.
    pub fn reset(&mut self) {
        self.result = None;
    }
}
