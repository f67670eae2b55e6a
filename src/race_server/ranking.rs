//! Ranking - Orders lanes by position
//!
//! Ties always resolve by ascending lane index, in both directions,
//! so every ordering here is total and repeatable.

use serde::{Deserialize, Serialize};

use crate::race_server::race::LANE_COUNT;

/// Lanes from furthest ahead to furthest behind
pub fn front_to_back(positions: &[i32; LANE_COUNT]) -> [usize; LANE_COUNT] {
    let mut order: [usize; LANE_COUNT] = std::array::from_fn(|lane| lane);
    // sort_by is stable, so equal positions keep ascending lane order
    order.sort_by(|&a, &b| positions[b].cmp(&positions[a]));
    order
}

/// Lanes from furthest behind to furthest ahead
pub fn back_to_front(positions: &[i32; LANE_COUNT]) -> [usize; LANE_COUNT] {
    let mut order: [usize; LANE_COUNT] = std::array::from_fn(|lane| lane);
    order.sort_by(|&a, &b| positions[a].cmp(&positions[b]));
    order
}

/// One lane's final standing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementEntry {
    /// 1 = first
    pub rank: usize,
    pub lane: usize,
    pub position: i32,
    /// Share of the finish line covered, 100.0 at the line
    pub percentage: f64,
}

/// Final ordered ranking of all lanes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    entries: Vec<PlacementEntry>,
}

impl Placement {
    /// Rank final positions against the given finish line
    pub fn compute(positions: &[i32; LANE_COUNT], finish_line: i32) -> Self {
        let entries = front_to_back(positions)
            .iter()
            .enumerate()
            .map(|(index, &lane)| PlacementEntry {
                rank: index + 1,
                lane,
                position: positions[lane],
                percentage: f64::from(positions[lane]) * 100.0 / f64::from(finish_line),
            })
            .collect();

        Self { entries }
    }

    /// Entries in rank order
    pub fn entries(&self) -> &[PlacementEntry] {
        &self.entries
    }

    pub fn leader(&self) -> &PlacementEntry {
        &self.entries[0]
    }

    pub fn last_place(&self) -> &PlacementEntry {
        &self.entries[LANE_COUNT - 1]
    }

    /// Rank of a lane, if it is a valid lane index
    pub fn rank_of(&self, lane: usize) -> Option<usize> {
        self.entries.iter().find(|e| e.lane == lane).map(|e| e.rank)
    }
}
