//! Settlement - Bet board and payout resolution
//!
//! Settling is a pure lookup of the winning lane in the bet board.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::race_server::race::LANE_COUNT;
use crate::race_server::ranking::Placement;

/// Opaque bettor identifier supplied by the host
pub type BettorId = String;

/// Rejected bets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BetError {
    #[error("lane {lane} does not exist")]
    LaneOutOfRange { lane: usize },

    #[error("{bettor} already bet on lane {lane}")]
    AlreadyPlaced { bettor: BettorId, lane: usize },
}

/// Bettors per lane, in the order their bets arrived
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetBoard {
    lanes: [Vec<BettorId>; LANE_COUNT],
}

impl BetBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from `(lane, bettor)` pairs, applying the same rules as `place`
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, BetError>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<BettorId>,
    {
        let mut board = Self::new();
        for (lane, bettor) in pairs {
            board.place(lane, bettor)?;
        }
        Ok(board)
    }

    /// Record a bet; each bettor may back one lane per race.
    ///
    /// A repeat bettor is turned away before the lane is looked at.
    pub fn place(&mut self, lane: usize, bettor: impl Into<BettorId>) -> Result<(), BetError> {
        let bettor = bettor.into();
        if let Some(existing) = self.lane_of(&bettor) {
            return Err(BetError::AlreadyPlaced {
                bettor,
                lane: existing,
            });
        }
        if lane >= LANE_COUNT {
            return Err(BetError::LaneOutOfRange { lane });
        }

        log::debug!("{bettor} bet on lane {lane}");
        self.lanes[lane].push(bettor);
        Ok(())
    }

    /// Bettors backing a lane; empty for unknown lanes
    pub fn bettors(&self, lane: usize) -> &[BettorId] {
        self.lanes.get(lane).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lane a bettor backed, if any
    pub fn lane_of(&self, bettor: &str) -> Option<usize> {
        self.lanes.iter().position(|lane| lane.iter().any(|b| b == bettor))
    }

    pub fn total_bets(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_bets() == 0
    }
}

/// Result of settling a race against the bet board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    Winners { winning_lane: usize, winners: Vec<BettorId> },
    NoWinners { winning_lane: usize },
}

impl Settlement {
    pub fn winning_lane(&self) -> usize {
        match self {
            Settlement::Winners { winning_lane, .. } | Settlement::NoWinners { winning_lane } => {
                *winning_lane
            }
        }
    }

    pub fn winners(&self) -> &[BettorId] {
        match self {
            Settlement::Winners { winners, .. } => winners,
            Settlement::NoWinners { .. } => &[],
        }
    }
}

/// Lane that wins: the leader, or the last lane in reverse mode
pub fn winning_lane(placement: &Placement, reverse_mode: bool) -> usize {
    if reverse_mode {
        placement.last_place().lane
    } else {
        placement.leader().lane
    }
}

/// Pay out the bettors of the winning lane
pub fn settle(placement: &Placement, reverse_mode: bool, bets: &BetBoard) -> Settlement {
    settle_lane(winning_lane(placement, reverse_mode), bets)
}

/// Pay out the bettors of an already decided lane
pub fn settle_lane(winning_lane: usize, bets: &BetBoard) -> Settlement {
    let winners = bets.bettors(winning_lane);
    if winners.is_empty() {
        log::info!("Lane {winning_lane} won, no winners");
        Settlement::NoWinners { winning_lane }
    } else {
        log::info!("Lane {winning_lane} won, {} winners", winners.len());
        Settlement::Winners {
            winning_lane,
            winners: winners.to_vec(),
        }
    }
}
