//! Simulation - Race server holding the open room
//!
//! Manages the room lifecycle (open, bet, start) and runs races
//! through the engine. Storage and delivery are left to the host.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::race_server::archetype::{Catalog, CatalogError};
use crate::race_server::race::{
    ConfigurationError, FrameObserver, Race, RaceConfig, RaceOutcome, LANE_COUNT,
};
use crate::race_server::random::RandomSource;
use crate::race_server::settlement::{BetBoard, BetError, BettorId, Settlement};

/// Server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub race: RaceConfig,
    /// Users allowed to start any room's race
    pub admins: Vec<String>,
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Server state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    Idle,
    Betting,
    Results,
}

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub races_run: u64,
    pub frames_simulated: u64,
    pub open_bets: usize,
    pub state: ServerState,
}

/// Room operation failures
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("a room is already open")]
    RoomExists,

    #[error("no room is open")]
    NoRoom,

    #[error("only the room owner can start the race")]
    NotOwner,

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Bet(#[from] BetError),
}

/// One lane of a room lineup, as shown in the lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneInfo {
    pub lane: usize,
    pub archetype_id: usize,
    pub name: String,
    pub description: String,
    pub basic_speed_bar: i32,
    pub max_speed_bar: i32,
}

/// Lobby view of the open room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub owner: String,
    pub lanes: Vec<LaneInfo>,
    pub bets: BetBoard,
}

/// Open room awaiting its race
#[derive(Debug, Clone)]
struct Room {
    owner: String,
    lanes: [usize; LANE_COUNT],
    bets: BetBoard,
}

/// Finished race together with its payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceReport {
    pub owner: String,
    pub lanes: [usize; LANE_COUNT],
    pub outcome: RaceOutcome,
    pub settlement: Settlement,
}

/// Main race server
pub struct RaceServer {
    catalog: Catalog,
    config: ServerConfig,
    state: ServerState,
    room: Option<Room>,
    races_run: u64,
    frames_simulated: u64,
}

impl RaceServer {
    /// Create a new race server
    pub fn new(catalog: Catalog, config: ServerConfig) -> Self {
        Self {
            catalog,
            config,
            state: ServerState::Idle,
            room: None,
            races_run: 0,
            frames_simulated: 0,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Open a room with a chosen lineup
    pub fn open_room(
        &mut self,
        owner: impl Into<String>,
        lanes: &[usize],
    ) -> Result<RoomInfo, RoomError> {
        if self.room.is_some() {
            return Err(RoomError::RoomExists);
        }

        // Same checks the race will run, so a bad lineup never takes bets
        Race::new(&self.catalog, lanes, self.config.race.clone())?;

        let mut lineup = [0; LANE_COUNT];
        lineup.copy_from_slice(lanes);

        let owner = owner.into();
        log::info!("Room opened by {owner} with lanes {lineup:?}");
        self.room = Some(Room {
            owner,
            lanes: lineup,
            bets: BetBoard::new(),
        });
        self.state = ServerState::Betting;
        self.room_info()
    }

    /// Open a room with a random lineup
    pub fn open_random_room<R: Rng + ?Sized>(
        &mut self,
        owner: impl Into<String>,
        rng: &mut R,
    ) -> Result<RoomInfo, RoomError> {
        if self.room.is_some() {
            return Err(RoomError::RoomExists);
        }
        let lanes = self.catalog.random_lanes(rng)?;
        self.open_room(owner, &lanes)
    }

    /// Current room lineup and bets
    pub fn room_info(&self) -> Result<RoomInfo, RoomError> {
        let room = self.room.as_ref().ok_or(RoomError::NoRoom)?;

        let lanes = room
            .lanes
            .iter()
            .enumerate()
            .map(|(lane, &archetype_id)| {
                let archetype = self.catalog.get(archetype_id)?;
                Ok(LaneInfo {
                    lane,
                    archetype_id,
                    name: archetype.name.clone(),
                    description: archetype.description.clone(),
                    basic_speed_bar: archetype.basic_speed_bar(),
                    max_speed_bar: archetype.max_speed_bar(),
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(RoomInfo {
            owner: room.owner.clone(),
            lanes,
            bets: room.bets.clone(),
        })
    }

    /// Back a lane in the open room
    pub fn place_bet(&mut self, bettor: impl Into<BettorId>, lane: usize) -> Result<(), RoomError> {
        let room = self.room.as_mut().ok_or(RoomError::NoRoom)?;
        room.bets.place(lane, bettor)?;
        Ok(())
    }

    fn may_start(&self, room: &Room, requester: &str) -> bool {
        room.owner == requester || self.config.admins.iter().any(|admin| admin == requester)
    }

    /// Close the room and run its race
    pub fn start_race<R, O>(
        &mut self,
        requester: &str,
        rng: &mut R,
        observer: &mut O,
    ) -> Result<RaceReport, RoomError>
    where
        R: RandomSource + ?Sized,
        O: FrameObserver + ?Sized,
    {
        let room = self.room.as_ref().ok_or(RoomError::NoRoom)?;
        if !self.may_start(room, requester) {
            return Err(RoomError::NotOwner);
        }

        // The room closes before the race runs so it cannot start twice
        let Some(room) = self.room.take() else {
            return Err(RoomError::NoRoom);
        };
        log::info!("Race started by {requester} for room of {}", room.owner);

        let race = Race::new(&self.catalog, &room.lanes, self.config.race.clone())?;
        let outcome = race.run(rng, observer);
        let settlement = outcome.settle(&room.bets);

        self.races_run += 1;
        self.frames_simulated += outcome.frames() as u64;
        self.state = ServerState::Results;

        Ok(RaceReport {
            owner: room.owner,
            lanes: room.lanes,
            outcome,
            settlement,
        })
    }

    /// Get server statistics
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            races_run: self.races_run,
            frames_simulated: self.frames_simulated,
            open_bets: self.room.as_ref().map_or(0, |room| room.bets.total_bets()),
            state: self.state,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Discard any open room
    pub fn reset(&mut self) {
        if let Some(room) = self.room.take() {
            log::info!("Room of {} discarded", room.owner);
        }
        self.state = ServerState::Idle;
    }
}
