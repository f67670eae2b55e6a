//! Race Server Module
//!
//! Six-lane turtle race: archetypes, abilities, the frame loop,
//! ranking and bet settlement, plus an in-memory room host.

pub mod ability;
pub mod archetype;
pub mod race;
pub mod random;
pub mod ranking;
pub mod settlement;
pub mod simulation;

pub use archetype::{AbilityKind, AbilityPhase, Archetype, Catalog, CatalogError};
pub use race::{
    ConfigurationError, FrameObserver, PositionSnapshot, Race, RaceConfig, RaceOutcome, RaceState,
    RaceStatus, ARCHETYPE_VALUE_LIMIT, LANE_COUNT, MAX_FRAME_LIMIT,
};
pub use random::{RandomSource, RngSource, ScriptedSource};
pub use ranking::{Placement, PlacementEntry};
pub use settlement::{BetBoard, BetError, BettorId, Settlement};
pub use simulation::{
    RaceReport, RaceServer, RoomError, RoomInfo, ServerConfig, ServerState, ServerStats,
};
