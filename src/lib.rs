//! # Tower Duel
//!
//! Turn and sync engine for a two-player tower stacking game. One peer
//! (the host) simulates; the other mirrors the host's world from periodic
//! snapshots and forwards its own input on its turn.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TOWER DUEL                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Engine-free primitives                    │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - Match logic                               │
//! │  ├── turn.rs     - Turn state machine                        │
//! │  ├── piece.rs    - Piece registry and stillness debounce     │
//! │  ├── bounds.rs   - World growth and camera follow            │
//! │  ├── state.rs    - Match state and turn actions              │
//! │  ├── tick.rs     - Host and mirror simulation ticks          │
//! │  ├── input.rs    - Input commands and client relay           │
//! │  ├── game_over.rs- Collapse and timeout detection            │
//! │  ├── rematch.rs  - Post-game handshake                       │
//! │  └── physics.rs  - Physics adapter                           │
//! │                                                              │
//! │  network/        - Peer plumbing                             │
//! │  ├── room.rs     - Room ids                                  │
//! │  ├── protocol.rs - Channel messages and wire formats         │
//! │  ├── transport.rs- Room contract and loopback rooms          │
//! │  ├── sync.rs     - Snapshot broadcast and reconciliation     │
//! │  ├── session.rs  - Per-peer game session                     │
//! │  ├── lobby.rs    - Room creation and joining                 │
//! │  └── driver.rs   - Async timer loop                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! - Only the host (or an offline session) spawns, settles and ends.
//! - The client's world is overwritten by every snapshot it applies.
//! - Client input is honoured only on the client's turn.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::DeterministicRng;
pub use game::config::GameConfig;
pub use game::state::{MatchState, Side};
pub use game::game_over::GameResult;
pub use network::session::{GameSession, SessionConfig};
pub use network::lobby::Lobby;
pub use network::transport::{LoopbackNetwork, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
