//! Input Commands and Remote Relay
//!
//! The client never mutates the authoritative piece. Its pointer intents are
//! turned into [`InputCommand`]s, throttled to the sync cadence, and applied
//! by the host through [`MatchState::apply_remote_input`].
//!
//! [`MatchState::apply_remote_input`]: crate::game::state::MatchState::apply_remote_input

use serde::{Serialize, Deserialize};

/// A client -> host intent for the held piece.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum InputCommand {
    /// Set the held piece's X (clamped by the receiver).
    Move {
        /// Requested horizontal position
        x: f32,
    },
    /// Rotate the held piece by one step.
    Rotate,
    /// Release the held piece.
    Drop,
}

/// Which pointer button was released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerButton {
    /// Left / touch: drop.
    Primary,
    /// Right: rotate.
    Secondary,
}

impl PointerButton {
    /// Command bound to releasing this button.
    pub fn command(self) -> InputCommand {
        match self {
            PointerButton::Primary => InputCommand::Drop,
            PointerButton::Secondary => InputCommand::Rotate,
        }
    }
}

/// Client-side outbox for pointer intents.
///
/// Pointer moves only record the latest X; one `Move` goes out per
/// [`flush`](Self::flush), which the session calls on the sync timer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemoteInputRelay {
    pending_x: Option<f32>,
    last_sent_x: Option<f32>,
}

impl RemoteInputRelay {
    /// Create an empty relay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pointer move to the already-clamped `x`.
    pub fn on_pointer_move(&mut self, x: f32) {
        self.pending_x = Some(x);
    }

    /// Translate a pointer release into a command to send immediately.
    ///
    /// A pending move is flushed first so the host drops from where the
    /// player released.
    pub fn on_pointer_release(&mut self, button: PointerButton) -> Vec<InputCommand> {
        let mut out = Vec::with_capacity(2);
        out.extend(self.flush());
        out.push(button.command());
        out
    }

    /// Emit the throttled `Move`, if the X changed since the last one sent.
    pub fn flush(&mut self) -> Option<InputCommand> {
        let x = self.pending_x.take()?;
        if self.last_sent_x == Some(x) {
            return None;
        }
        self.last_sent_x = Some(x);
        Some(InputCommand::Move { x })
    }

    /// Forget pending and sent positions (turn change or restart).
    pub fn reset(&mut self) {
        self.pending_x = None;
        self.last_sent_x = None;
    }
}
