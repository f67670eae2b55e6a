//! Ability - Per-frame effects of the ten ability kinds
//!
//! Effects write into the frame buffers of a shared `RaceState`. They run
//! in lane order within each phase and may read what earlier lanes wrote,
//! so the draw and write order below is part of the race result.
//!
//! Buffer writes saturate at the `i32` bounds.

use crate::race_server::archetype::{AbilityKind, AbilityPhase, Archetype};
use crate::race_server::race::{RaceState, LANE_COUNT};
use crate::race_server::random::RandomSource;
use crate::race_server::ranking::{back_to_front, front_to_back};

/// Draw threshold for `FlatRandomChoice`
const COIN_FLIP: u32 = 5_000;

/// Stat-driven randomized speed for one lane and frame
pub fn standard_increment<R: RandomSource + ?Sized>(archetype: &Archetype, rng: &mut R) -> i32 {
    let speed = f64::from(archetype.speed_stat);
    let roll = rng.unit() * speed * 1.2 + f64::from(archetype.base_stat) + speed * 0.4;
    roll.floor() as i32
}

/// Run one lane's ability for the current frame
pub fn execute<R: RandomSource + ?Sized>(
    lane: usize,
    archetype: &Archetype,
    state: &mut RaceState,
    rng: &mut R,
    honor_reverse_toggle: bool,
) {
    let (arg1, arg2) = (archetype.arg1, archetype.arg2);

    match archetype.ability {
        AbilityKind::NoAbility => {}

        AbilityKind::PercentProc => {
            let roll = rng.roll();
            if i64::from(roll) < i64::from(arg1) * 100 {
                log::trace!("lane {lane} proc hit ({roll}), +{arg2}");
                add_ability(state, lane, arg2);
            }
        }

        AbilityKind::FixedBoost => {
            add_basic(state, lane, arg1);
            return;
        }

        AbilityKind::PositionConditional => {
            let order = if arg1 > 0 {
                front_to_back(&state.positions)
            } else {
                back_to_front(&state.positions)
            };
            let rank = rank_in(&order, lane);
            if rank as i64 <= i64::from(arg1).abs() {
                log::trace!("lane {lane} at rank {rank} qualifies, +{arg2}");
                add_ability(state, lane, arg2);
            }
        }

        AbilityKind::CircularDrain => {
            add_basic(state, lane, standard_increment(archetype, rng));
            let behind = (lane + LANE_COUNT - 1) % LANE_COUNT;
            let ahead = (lane + 1) % LANE_COUNT;
            add_ability(state, behind, arg1.saturating_neg());
            add_ability(state, ahead, arg1.saturating_neg());
            return;
        }

        AbilityKind::RankAttack => {
            let order = front_to_back(&state.positions);
            let count = arg1.unsigned_abs().min(LANE_COUNT as u32) as usize;
            let targets = if arg1 >= 0 {
                &order[..count]
            } else {
                &order[LANE_COUNT - count..]
            };
            for &target in targets.iter().filter(|&&target| target != lane) {
                add_ability(state, target, arg2.saturating_neg());
            }
            log::trace!("lane {lane} attacked {targets:?} for {arg2}");
        }

        AbilityKind::ReverseModeToggle => {
            if honor_reverse_toggle {
                log::trace!("lane {lane} turned on reverse mode");
                state.reverse_mode = true;
            }
        }

        AbilityKind::FlatRandomChoice => {
            let roll = rng.roll();
            add_basic(state, lane, if roll > COIN_FLIP { arg1 } else { arg2 });
            return;
        }

        AbilityKind::ScaleAllAbilitySpeed => {
            for speed in state.ability_speed.iter_mut() {
                let scaled = i64::from(*speed) * i64::from(arg1) / 100;
                *speed = scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
            }
        }

        AbilityKind::ClearNegative => {
            clear_negative(state, lane);
        }
    }

    add_basic(state, lane, standard_increment(archetype, rng));
}

/// Re-clamp lanes whose cleanse resolves in the negative phase, after all
/// effects of the frame have landed
pub fn final_sweep(lineup: &[Archetype; LANE_COUNT], state: &mut RaceState) {
    for (lane, archetype) in lineup.iter().enumerate() {
        if archetype.ability == AbilityKind::ClearNegative
            && archetype.phase == AbilityPhase::Negative
        {
            clear_negative(state, lane);
        }
    }
}

fn add_basic(state: &mut RaceState, lane: usize, amount: i32) {
    state.basic_speed[lane] = state.basic_speed[lane].saturating_add(amount);
}

fn add_ability(state: &mut RaceState, lane: usize, amount: i32) {
    state.ability_speed[lane] = state.ability_speed[lane].saturating_add(amount);
}

fn clear_negative(state: &mut RaceState, lane: usize) {
    if state.ability_speed[lane] < 0 {
        state.ability_speed[lane] = 0;
    }
}

/// 1-based rank of a lane within an ordering
fn rank_in(order: &[usize; LANE_COUNT], lane: usize) -> usize {
    order
        .iter()
        .position(|&l| l == lane)
        .map_or(LANE_COUNT, |index| index + 1)
}
