//! Rematch Negotiation
//!
//! After game over each player fills one decision slot. Two `Rematch`
//! decisions restart the match in place; any `Quit` sends both players back
//! to the lobby. Offline there is no remote slot, so the local decision is
//! final.

use serde::{Serialize, Deserialize};

/// One player's post-game choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RematchDecision {
    /// Play again in the same room.
    Rematch,
    /// Leave to the lobby.
    Quit,
}

/// What the negotiation decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RematchResolution {
    /// Restart with fresh state, same room and roles.
    Restart,
    /// Disband the session and release the room.
    ReturnToLobby,
}

/// Two-slot rematch handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RematchNegotiator {
    online: bool,
    local: Option<RematchDecision>,
    remote: Option<RematchDecision>,
    resolved: Option<RematchResolution>,
}

impl RematchNegotiator {
    /// Negotiator for a two-player session.
    pub fn online() -> Self {
        Self {
            online: true,
            local: None,
            remote: None,
            resolved: None,
        }
    }

    /// Negotiator for a single-player session.
    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::online()
        }
    }

    /// Record the local player's decision.
    ///
    /// Returns the resolution the first time one is reached.
    pub fn set_local(&mut self, decision: RematchDecision) -> Option<RematchResolution> {
        if self.resolved.is_some() {
            return None;
        }
        self.local = Some(decision);
        self.evaluate()
    }

    /// Record the remote player's decision.
    pub fn set_remote(&mut self, decision: RematchDecision) -> Option<RematchResolution> {
        if self.resolved.is_some() || !self.online {
            return None;
        }
        self.remote = Some(decision);
        self.evaluate()
    }

    /// Local slot.
    pub fn local(&self) -> Option<RematchDecision> {
        self.local
    }

    /// Remote slot.
    pub fn remote(&self) -> Option<RematchDecision> {
        self.remote
    }

    /// Resolution reached so far.
    pub fn resolution(&self) -> Option<RematchResolution> {
        self.resolved
    }

    /// Empty both slots for the next game.
    pub fn reset(&mut self) {
        self.local = None;
        self.remote = None;
        self.resolved = None;
    }

    fn evaluate(&mut self) -> Option<RematchResolution> {
        use RematchDecision::*;

        let resolution = match (self.online, self.local, self.remote) {
            (_, Some(Quit), _) | (true, _, Some(Quit)) => Some(RematchResolution::ReturnToLobby),
            (false, Some(Rematch), _) => Some(RematchResolution::Restart),
            (true, Some(Rematch), Some(Rematch)) => Some(RematchResolution::Restart),
            _ => None,
        };
        self.resolved = resolution;
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RematchDecision::*;

    #[test]
    fn test_both_rematch_restarts() {
        let mut negotiator = RematchNegotiator::online();
        assert_eq!(negotiator.set_local(Rematch), None);
        assert_eq!(negotiator.set_remote(Rematch), Some(RematchResolution::Restart));
    }

    #[test]
    fn test_remote_first() {
        let mut negotiator = RematchNegotiator::online();
        assert_eq!(negotiator.set_remote(Rematch), None);
        assert_eq!(negotiator.set_local(Rematch), Some(RematchResolution::Restart));
    }

    #[test]
    fn test_any_quit_returns_to_lobby() {
        let mut negotiator = RematchNegotiator::online();
        assert_eq!(negotiator.set_local(Rematch), None);
        assert_eq!(negotiator.set_remote(Quit), Some(RematchResolution::ReturnToLobby));

        let mut negotiator = RematchNegotiator::online();
        assert_eq!(negotiator.set_local(Quit), Some(RematchResolution::ReturnToLobby));
    }

    #[test]
    fn test_single_rematch_waits() {
        let mut negotiator = RematchNegotiator::online();
        assert_eq!(negotiator.set_local(Rematch), None);
        assert_eq!(negotiator.resolution(), None);
    }

    #[test]
    fn test_resolves_exactly_once() {
        let mut negotiator = RematchNegotiator::online();
        negotiator.set_local(Rematch);
        assert_eq!(negotiator.set_remote(Rematch), Some(RematchResolution::Restart));
        assert_eq!(negotiator.set_remote(Quit), None);
        assert_eq!(negotiator.set_local(Quit), None);
        assert_eq!(negotiator.resolution(), Some(RematchResolution::Restart));
    }

    #[test]
    fn test_offline_is_immediate() {
        let mut negotiator = RematchNegotiator::offline();
        assert_eq!(negotiator.set_local(Rematch), Some(RematchResolution::Restart));

        let mut negotiator = RematchNegotiator::offline();
        assert_eq!(negotiator.set_remote(Quit), None);
        assert_eq!(negotiator.set_local(Quit), Some(RematchResolution::ReturnToLobby));
    }

    #[test]
    fn test_reset_clears_slots() {
        let mut negotiator = RematchNegotiator::online();
        negotiator.set_local(Quit);
        negotiator.reset();
        assert_eq!(negotiator.local(), None);
        assert_eq!(negotiator.resolution(), None);
        assert_eq!(serde_json::to_string(&Rematch).unwrap(), "\"rematch\"");
    }
}
