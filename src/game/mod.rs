//! Game Logic Module
//!
//! Engine-free turn, piece and world logic. Physics and rendering are
//! reached only through the [`PhysicsWorld`] and [`Viewport`] adapters.
//!
//! ## Module Structure
//!
//! - `config`: Tuning constants
//! - `catalog`: Piece kinds
//! - `piece`: Piece registry and stillness detection
//! - `turn`: Turn state machine
//! - `bounds`: World growth and camera scroll
//! - `state`: Match state and turn actions
//! - `tick`: Authoritative and mirror simulation ticks
//! - `input`: Input commands and the client relay
//! - `game_over`: Collapse and timeout detection
//! - `rematch`: Post-game handshake
//! - `events`: Lifecycle events and listeners
//! - `physics`, `viewport`: Engine adapters

pub mod config;
pub mod catalog;
pub mod piece;
pub mod turn;
pub mod bounds;
pub mod state;
pub mod tick;
pub mod input;
pub mod game_over;
pub mod rematch;
pub mod events;
pub mod physics;
pub mod viewport;

// Re-export key types
pub use config::{GameConfig, ConfigError};
pub use piece::{Piece, PieceId, PieceState, PieceRegistry, StillnessRule};
pub use turn::{TurnPhase, TurnStateMachine};
pub use bounds::{WorldBounds, WorldBoundsManager};
pub use state::{MatchState, MatchError, Side};
pub use tick::TickResult;
pub use input::{InputCommand, PointerButton, RemoteInputRelay};
pub use game_over::{EndCause, GameOverDetector, GameResult};
pub use rematch::{RematchDecision, RematchNegotiator, RematchResolution};
pub use events::{EventLog, GameEvent, GameEventData, SessionListener};
pub use physics::{BodyState, PhysicsWorld, SimplePhysics};
pub use viewport::{RecordingViewport, Viewport};
