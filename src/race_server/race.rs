//! Race - Race configuration, state and the frame loop
//!
//! Handles race setup, ability resolution per frame, and finish detection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::race_server::ability;
use crate::race_server::archetype::{AbilityPhase, Archetype, Catalog, CatalogError};
use crate::race_server::random::RandomSource;
use crate::race_server::ranking::Placement;
use crate::race_server::settlement::{self, BetBoard, Settlement};

/// Number of lanes in every race
pub const LANE_COUNT: usize = 6;

/// Largest magnitude accepted for archetype stats and ability arguments
pub const ARCHETYPE_VALUE_LIMIT: i32 = 10_000;

/// Largest accepted `max_frame`
pub const MAX_FRAME_LIMIT: u32 = 10_000;

/// Race configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Position at which a lane has finished
    pub finish_line: i32,
    /// Index of the last frame that may run
    pub max_frame: u32,
    /// Whether the reverse-mode ability actually flips the race
    pub honor_reverse_toggle: bool,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            finish_line: 468,
            max_frame: 20,
            honor_reverse_toggle: true,
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.finish_line <= 0 {
            return Err(ConfigurationError::InvalidRaceConfig(
                "finish_line must be positive",
            ));
        }
        if self.max_frame > MAX_FRAME_LIMIT {
            return Err(ConfigurationError::InvalidRaceConfig(
                "max_frame exceeds the frame limit",
            ));
        }
        Ok(())
    }
}

/// Rejected race setups
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("lane assignment must name exactly {expected} archetypes, got {actual}")]
    LaneCount { expected: usize, actual: usize },

    #[error("lane {lane} cannot be resolved: {source}")]
    UnresolvedArchetype {
        lane: usize,
        #[source]
        source: CatalogError,
    },

    #[error("lane {lane}: {field} = {value} is outside -{limit}..={limit}")]
    ArchetypeOutOfRange {
        lane: usize,
        field: &'static str,
        value: i32,
        limit: i32,
    },

    #[error("invalid race config: {0}")]
    InvalidRaceConfig(&'static str),
}

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Running,
    Finished,
}

/// Mutable per-race state; the speed buffers only live for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceState {
    pub positions: [i32; LANE_COUNT],
    pub frame: u32,
    pub basic_speed: [i32; LANE_COUNT],
    pub ability_speed: [i32; LANE_COUNT],
    pub reverse_mode: bool,
}

impl RaceState {
    fn reset_buffers(&mut self) {
        self.basic_speed = [0; LANE_COUNT];
        self.ability_speed = [0; LANE_COUNT];
    }
}

/// Positions at the end of one frame, handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub frame: u32,
    pub positions: [i32; LANE_COUNT],
}

/// Receives every completed frame
pub trait FrameObserver {
    fn on_frame(&mut self, snapshot: &PositionSnapshot);
}

impl FrameObserver for () {
    fn on_frame(&mut self, _snapshot: &PositionSnapshot) {}
}

impl FrameObserver for Vec<PositionSnapshot> {
    fn on_frame(&mut self, snapshot: &PositionSnapshot) {
        self.push(*snapshot);
    }
}

/// Everything a finished race produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub snapshots: Vec<PositionSnapshot>,
    pub placement: Placement,
    pub reverse_mode: bool,
}

impl RaceOutcome {
    /// Number of frames simulated
    pub fn frames(&self) -> usize {
        self.snapshots.len()
    }

    pub fn winning_lane(&self) -> usize {
        settlement::winning_lane(&self.placement, self.reverse_mode)
    }

    pub fn settle(&self, bets: &BetBoard) -> Settlement {
        settlement::settle(&self.placement, self.reverse_mode, bets)
    }
}

/// One race over a fixed lineup
#[derive(Debug, Clone)]
pub struct Race {
    config: RaceConfig,
    lineup: [Archetype; LANE_COUNT],
    state: RaceState,
    status: RaceStatus,
}

impl Race {
    /// Resolve a lane assignment against the catalog
    pub fn new(
        catalog: &Catalog,
        lanes: &[usize],
        config: RaceConfig,
    ) -> Result<Self, ConfigurationError> {
        if lanes.len() != LANE_COUNT {
            return Err(ConfigurationError::LaneCount {
                expected: LANE_COUNT,
                actual: lanes.len(),
            });
        }

        let lineup = lanes
            .iter()
            .enumerate()
            .map(|(lane, &id)| {
                catalog
                    .get(id)
                    .cloned()
                    .map_err(|source| ConfigurationError::UnresolvedArchetype { lane, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::with_lineup(lineup, config)
    }

    /// Race over archetypes given directly, one per lane
    pub fn with_lineup(
        lineup: Vec<Archetype>,
        config: RaceConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let actual = lineup.len();
        let lineup: [Archetype; LANE_COUNT] =
            lineup.try_into().map_err(|_| ConfigurationError::LaneCount {
                expected: LANE_COUNT,
                actual,
            })?;
        for (lane, archetype) in lineup.iter().enumerate() {
            check_archetype(lane, archetype)?;
        }

        Ok(Self {
            config,
            lineup,
            state: RaceState::default(),
            status: RaceStatus::Running,
        })
    }

    pub fn status(&self) -> RaceStatus {
        self.status
    }

    pub fn state(&self) -> &RaceState {
        &self.state
    }

    pub fn lineup(&self) -> &[Archetype; LANE_COUNT] {
        &self.lineup
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Simulate one frame; `None` once the race has finished
    pub fn step<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Option<PositionSnapshot> {
        if self.status == RaceStatus::Finished {
            return None;
        }

        self.state.reset_buffers();
        for phase in [AbilityPhase::Positive, AbilityPhase::Negative] {
            for (lane, archetype) in self.lineup.iter().enumerate() {
                if archetype.phase == phase {
                    ability::execute(
                        lane,
                        archetype,
                        &mut self.state,
                        rng,
                        self.config.honor_reverse_toggle,
                    );
                }
            }
        }
        ability::final_sweep(&self.lineup, &mut self.state);

        for lane in 0..LANE_COUNT {
            let delta = self.state.basic_speed[lane].saturating_add(self.state.ability_speed[lane]);
            self.state.positions[lane] = self.state.positions[lane].saturating_add(delta);
        }

        let snapshot = PositionSnapshot {
            frame: self.state.frame,
            positions: self.state.positions,
        };
        log::debug!("frame {} positions {:?}", snapshot.frame, snapshot.positions);

        // Check for finish
        let crossed = self.state.positions.iter().any(|&p| p >= self.config.finish_line);
        if crossed || self.state.frame >= self.config.max_frame {
            self.status = RaceStatus::Finished;
        } else {
            self.state.frame += 1;
        }

        Some(snapshot)
    }

    /// Run to completion, feeding every frame to the observer
    pub fn run<R, O>(mut self, rng: &mut R, observer: &mut O) -> RaceOutcome
    where
        R: RandomSource + ?Sized,
        O: FrameObserver + ?Sized,
    {
        let mut snapshots = Vec::with_capacity(self.config.max_frame as usize + 1);
        while let Some(snapshot) = self.step(rng) {
            observer.on_frame(&snapshot);
            snapshots.push(snapshot);
        }

        let placement = Placement::compute(&self.state.positions, self.config.finish_line);
        log::info!(
            "Race finished after {} frames, leader lane {}, reverse mode {}",
            snapshots.len(),
            placement.leader().lane,
            self.state.reverse_mode
        );

        RaceOutcome {
            snapshots,
            placement,
            reverse_mode: self.state.reverse_mode,
        }
    }
}

/// Stats and arguments must stay small enough that a frame cannot overflow
fn check_archetype(lane: usize, archetype: &Archetype) -> Result<(), ConfigurationError> {
    let fields = [
        ("speed_stat", archetype.speed_stat),
        ("base_stat", archetype.base_stat),
        ("arg1", archetype.arg1),
        ("arg2", archetype.arg2),
    ];
    for (field, value) in fields {
        if value.unsigned_abs() > ARCHETYPE_VALUE_LIMIT.unsigned_abs() {
            return Err(ConfigurationError::ArchetypeOutOfRange {
                lane,
                field,
                value,
                limit: ARCHETYPE_VALUE_LIMIT,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race_server::archetype::AbilityKind;
    use crate::race_server::random::{RngSource, ScriptedSource};
    use proptest::prelude::*;

    fn plain_lineup() -> Vec<Archetype> {
        (0..LANE_COUNT)
            .map(|i| Archetype::plain(format!("Lane {i}"), 5, 5))
            .collect()
    }

    fn with_ability(
        name: &str,
        kind: AbilityKind,
        phase: AbilityPhase,
        arg1: i32,
        arg2: i32,
    ) -> Archetype {
        Archetype::plain(name, 5, 5).with_ability(kind, phase, arg1, arg2)
    }

    #[test]
    fn rejects_wrong_lane_count() {
        let catalog = Catalog::new(vec![Archetype::plain("Only", 5, 5)]);
        let err = Race::new(&catalog, &[0, 0, 0], RaceConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LaneCount {
                expected: 6,
                actual: 3
            }
        ));
    }

    #[test]
    fn rejects_unknown_archetype() {
        let catalog = Catalog::new(vec![Archetype::plain("Only", 5, 5)]);
        let err = Race::new(&catalog, &[0, 0, 0, 0, 7, 0], RaceConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnresolvedArchetype {
                lane: 4,
                source: CatalogError::UnknownArchetype { id: 7, len: 1 }
            }
        ));
    }

    #[test]
    fn rejects_bad_finish_line() {
        let config = RaceConfig {
            finish_line: 0,
            ..RaceConfig::default()
        };
        assert!(matches!(
            Race::with_lineup(plain_lineup(), config),
            Err(ConfigurationError::InvalidRaceConfig(_))
        ));
    }

    #[test]
    fn rejects_unbounded_frame_cap() {
        let config: RaceConfig = serde_json::from_str(r#"{"max_frame": 4294967295}"#).unwrap();
        assert_eq!(config.max_frame, u32::MAX);
        assert!(matches!(
            Race::with_lineup(plain_lineup(), config),
            Err(ConfigurationError::InvalidRaceConfig(_))
        ));

        let at_limit = RaceConfig {
            max_frame: MAX_FRAME_LIMIT,
            ..RaceConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn rejects_oversized_archetype_values() {
        let lineup: Vec<Archetype> = (0..LANE_COUNT)
            .map(|_| {
                Archetype::plain("Cannon", 0, 0).with_ability(
                    AbilityKind::FixedBoost,
                    AbilityPhase::Positive,
                    -300_000_000,
                    0,
                )
            })
            .collect();
        assert!(matches!(
            Race::with_lineup(lineup, RaceConfig::default()),
            Err(ConfigurationError::ArchetypeOutOfRange {
                lane: 0,
                field: "arg1",
                value: -300_000_000,
                ..
            })
        ));

        let mut lineup = plain_lineup();
        lineup[3].base_stat = ARCHETYPE_VALUE_LIMIT + 1;
        assert!(matches!(
            Race::with_lineup(lineup, RaceConfig::default()),
            Err(ConfigurationError::ArchetypeOutOfRange {
                lane: 3,
                field: "base_stat",
                ..
            })
        ));
    }

    #[test]
    fn stacked_scaling_saturates_positions() {
        let mut lineup = vec![with_ability(
            "Proc",
            AbilityKind::PercentProc,
            AbilityPhase::Positive,
            100,
            ARCHETYPE_VALUE_LIMIT,
        )];
        for _ in 1..LANE_COUNT {
            lineup.push(with_ability(
                "Amp",
                AbilityKind::ScaleAllAbilitySpeed,
                AbilityPhase::Positive,
                ARCHETYPE_VALUE_LIMIT,
                0,
            ));
        }

        let race = Race::with_lineup(lineup, RaceConfig::default()).unwrap();
        let outcome = race.run(&mut ScriptedSource::constant(0.0), &mut ());

        assert_eq!(outcome.frames(), 1);
        assert_eq!(outcome.snapshots[0].positions[0], i32::MAX);
        assert_eq!(outcome.placement.leader().lane, 0);
    }

    #[test]
    fn draws_follow_phase_then_lane_order() {
        // spd 10, bas 0: increment = floor(u * 12 + 4)
        let racer = |kind, phase, arg1, arg2| {
            Archetype::plain("Order", 10, 0).with_ability(kind, phase, arg1, arg2)
        };
        let lineup = vec![
            racer(AbilityKind::NoAbility, AbilityPhase::Negative, 0, 0),
            racer(AbilityKind::PercentProc, AbilityPhase::Positive, 50, 100),
            racer(AbilityKind::NoAbility, AbilityPhase::Positive, 0, 0),
            racer(AbilityKind::FixedBoost, AbilityPhase::Negative, 7, 0),
            racer(AbilityKind::FlatRandomChoice, AbilityPhase::Negative, 30, 3),
            racer(AbilityKind::NoAbility, AbilityPhase::Positive, 0, 0),
        ];

        let mut race = Race::with_lineup(lineup, RaceConfig::default()).unwrap();
        assert_eq!(race.lineup()[0].phase, AbilityPhase::Negative);
        assert_eq!(race.config().finish_line, 468);

        // lane 1 roll, lane 1 increment, lane 2, lane 5, then lane 0, lane 4 roll
        let mut rng = ScriptedSource::new([0.1, 0.3, 0.55, 0.8, 0.9, 0.6]);
        let snapshot = race.step(&mut rng).unwrap();

        assert_eq!(rng.draws(), 6);
        assert_eq!(race.state().basic_speed, [14, 7, 10, 7, 30, 13]);
        assert_eq!(race.state().ability_speed, [0, 100, 0, 0, 0, 0]);
        assert_eq!(snapshot.positions, [14, 107, 10, 7, 30, 13]);
    }

    #[test]
    fn frame_cap_ends_slow_race() {
        // 0.0 draws give 5 + 2 = 7 per frame, far from the line
        let race = Race::with_lineup(plain_lineup(), RaceConfig::default()).unwrap();
        let mut frames: Vec<PositionSnapshot> = Vec::new();
        let outcome = race.run(&mut ScriptedSource::constant(0.0), &mut frames);

        assert_eq!(outcome.frames(), 21);
        assert_eq!(frames, outcome.snapshots);
        assert_eq!(outcome.snapshots.last().unwrap().frame, 20);
        assert_eq!(outcome.snapshots.last().unwrap().positions, [147; LANE_COUNT]);

        let lanes: Vec<usize> = outcome.placement.entries().iter().map(|e| e.lane).collect();
        assert_eq!(lanes, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn finish_line_ends_race_early() {
        let mut lineup = plain_lineup();
        lineup[2] = Archetype::plain("Rocket", 0, 0).with_ability(
            AbilityKind::FixedBoost,
            AbilityPhase::Positive,
            100,
            0,
        );

        let mut race = Race::with_lineup(lineup, RaceConfig::default()).unwrap();
        let mut rng = ScriptedSource::constant(0.0);
        let mut last = None;
        while let Some(snapshot) = race.step(&mut rng) {
            last = Some(snapshot);
        }

        // 100 per frame crosses 468 on frame index 4
        let last = last.unwrap();
        assert_eq!(last.frame, 4);
        assert_eq!(last.positions[2], 500);
        assert_eq!(race.status(), RaceStatus::Finished);
        assert!(race.step(&mut rng).is_none());
    }

    #[test]
    fn negative_phase_resolves_after_positive() {
        let mut lineup = plain_lineup();
        // lane 0 drains its neighbours in the positive phase,
        // lane 1 cleans up afterwards in the negative phase
        lineup[0] = with_ability("Mud", AbilityKind::CircularDrain, AbilityPhase::Positive, 3, 0);
        lineup[1] = with_ability("Clean", AbilityKind::ClearNegative, AbilityPhase::Negative, 0, 0);

        let mut race = Race::with_lineup(lineup, RaceConfig::default()).unwrap();
        let snapshot = race.step(&mut ScriptedSource::constant(0.0)).unwrap();

        assert_eq!(race.state().ability_speed, [0, 0, 0, 0, 0, -3]);
        assert_eq!(snapshot.positions, [7, 7, 7, 7, 7, 4]);
    }

    #[test]
    fn final_sweep_undoes_late_negative_drain() {
        let mut lineup = plain_lineup();
        lineup[1] = with_ability("Clean", AbilityKind::ClearNegative, AbilityPhase::Negative, 0, 0);
        // lane 2 drains lane 1 after lane 1 already cleaned itself
        lineup[2] = with_ability("Mud", AbilityKind::CircularDrain, AbilityPhase::Negative, 4, 0);

        let mut race = Race::with_lineup(lineup, RaceConfig::default()).unwrap();
        race.step(&mut ScriptedSource::constant(0.0)).unwrap();

        assert_eq!(race.state().ability_speed[1], 0);
        assert_eq!(race.state().ability_speed[3], -4);
    }

    #[test]
    fn reverse_mode_reaches_race_state() {
        let mut lineup = plain_lineup();
        lineup[4] = with_ability(
            "Trick",
            AbilityKind::ReverseModeToggle,
            AbilityPhase::Positive,
            0,
            0,
        );

        let outcome = Race::with_lineup(lineup.clone(), RaceConfig::default())
            .unwrap()
            .run(&mut ScriptedSource::constant(0.0), &mut ());
        assert!(outcome.reverse_mode);
        assert_eq!(outcome.winning_lane(), 5);

        let legacy = RaceConfig {
            honor_reverse_toggle: false,
            ..RaceConfig::default()
        };
        let outcome = Race::with_lineup(lineup, legacy)
            .unwrap()
            .run(&mut ScriptedSource::constant(0.0), &mut ());
        assert!(!outcome.reverse_mode);
        assert_eq!(outcome.winning_lane(), 0);
    }

    fn racer_strategy() -> impl Strategy<Value = (i32, i32, usize, bool, i32, i32)> {
        (0i32..20, -5i32..20, 0usize..10, any::<bool>(), -8i32..80, -30i32..60)
    }

    proptest! {
        #[test]
        fn any_lineup_terminates_within_frame_cap(
            seed in any::<u64>(),
            racers in prop::collection::vec(racer_strategy(), LANE_COUNT),
        ) {
            let kinds = [
                AbilityKind::NoAbility,
                AbilityKind::PercentProc,
                AbilityKind::FixedBoost,
                AbilityKind::PositionConditional,
                AbilityKind::CircularDrain,
                AbilityKind::RankAttack,
                AbilityKind::ReverseModeToggle,
                AbilityKind::FlatRandomChoice,
                AbilityKind::ScaleAllAbilitySpeed,
                AbilityKind::ClearNegative,
            ];
            let lineup: Vec<Archetype> = racers
                .iter()
                .map(|&(spd, bas, kind, negative, arg1, arg2)| {
                    let phase = if negative {
                        AbilityPhase::Negative
                    } else {
                        AbilityPhase::Positive
                    };
                    Archetype::plain("Prop", spd, bas).with_ability(kinds[kind], phase, arg1, arg2)
                })
                .collect();

            let mut race = Race::with_lineup(lineup.clone(), RaceConfig::default()).unwrap();
            let mut rng = RngSource::seeded(seed);
            let mut frames = 0;
            while let Some(snapshot) = race.step(&mut rng) {
                frames += 1;
                prop_assert!(snapshot.frame <= 20);
                for (lane, archetype) in lineup.iter().enumerate() {
                    let cleanses_late = archetype.ability == AbilityKind::ClearNegative
                        && archetype.phase == AbilityPhase::Negative;
                    if cleanses_late {
                        prop_assert!(race.state().ability_speed[lane] >= 0);
                    }
                }
            }
            prop_assert!(frames <= 21);
        }
    }
}
